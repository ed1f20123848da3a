/*++

Licensed under the Apache-2.0 license.

File Name:

    trng.rs

Abstract:

    File contains API for cryptographic random number generation on top of
    the raw hardware entropy capability.

--*/

use crate::soc::EntropySource;
use vaultboot_error::{VaultbootError, VaultbootResult};

/// True random number generator with a bounded readiness budget.
///
/// A stalled hardware source surfaces as an initialization failure, never
/// a hang. Jitter delays degrade gracefully without this driver; anything
/// needing cryptographic randomness (key material, nonces) does not.
pub struct Trng {
    retry_budget: u32,
}

impl Trng {
    /// Default number of readiness polls before giving up.
    pub const DEFAULT_RETRY_BUDGET: u32 = 1000;

    pub fn new() -> Self {
        Self {
            retry_budget: Self::DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(retry_budget: u32) -> Self {
        Self { retry_budget }
    }

    /// Fill `dest` with random bytes.
    pub fn generate(
        &mut self,
        entropy: &mut impl EntropySource,
        dest: &mut [u8],
    ) -> VaultbootResult<()> {
        if dest.is_empty() {
            return Err(VaultbootError::DRIVER_TRNG_EMPTY_REQUEST);
        }

        for _ in 0..self.retry_budget.max(1) {
            if entropy.try_fill(dest) {
                return Ok(());
            }
        }

        Err(VaultbootError::DRIVER_TRNG_NOT_READY)
    }

    /// Generate a fixed-size array of random bytes.
    pub fn generate_array<const N: usize>(
        &mut self,
        entropy: &mut impl EntropySource,
    ) -> VaultbootResult<[u8; N]> {
        let mut out = [0u8; N];
        self.generate(entropy, &mut out)?;
        Ok(out)
    }
}

impl Default for Trng {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Entropy source that becomes ready after a fixed number of polls.
    struct SlowEntropy {
        polls_until_ready: u32,
        fill: u8,
    }

    impl EntropySource for SlowEntropy {
        fn try_fill(&mut self, dest: &mut [u8]) -> bool {
            if self.polls_until_ready > 0 {
                self.polls_until_ready -= 1;
                return false;
            }
            dest.fill(self.fill);
            true
        }
    }

    #[test]
    fn test_generate_after_retries() {
        let mut entropy = SlowEntropy {
            polls_until_ready: 5,
            fill: 0xAB,
        };
        let mut trng = Trng::new();
        let bytes: [u8; 16] = trng.generate_array(&mut entropy).unwrap();
        assert_eq!(bytes, [0xAB; 16]);
    }

    #[test]
    fn test_stalled_source_fails_bounded() {
        let mut entropy = SlowEntropy {
            polls_until_ready: u32::MAX,
            fill: 0,
        };
        let mut trng = Trng::with_retry_budget(10);
        let mut dest = [0u8; 8];
        assert_eq!(
            trng.generate(&mut entropy, &mut dest),
            Err(VaultbootError::DRIVER_TRNG_NOT_READY)
        );
    }

    #[test]
    fn test_empty_request_rejected() {
        let mut entropy = SlowEntropy {
            polls_until_ready: 0,
            fill: 0,
        };
        let mut trng = Trng::new();
        assert_eq!(
            trng.generate(&mut entropy, &mut []),
            Err(VaultbootError::DRIVER_TRNG_EMPTY_REQUEST)
        );
    }
}
