/*++

Licensed under the Apache-2.0 license.

File Name:

    jitter.rs

Abstract:

    File contains the random jitter source used to desynchronize the timing
    of security-critical comparisons.

--*/

use crate::xoshiro::Xoshiro128;
use core::hint::black_box;

/// Default lower bound of the jitter window, in abstract time units.
pub const JITTER_MIN_UNITS: u32 = 100;

/// Default upper bound of the jitter window, in abstract time units.
pub const JITTER_MAX_UNITS: u32 = 1100;

/// Delay applied when the entropy source was not ready at seeding time.
const DEGRADED_DELAY_UNITS: u32 = JITTER_MAX_UNITS;

/// Random delay source.
///
/// Callers are required to invoke [`JitterSource::jitter`] immediately
/// before and after every security-critical comparison. An unseeded source
/// degrades to a fixed conservative delay rather than failing; callers that
/// need cryptographic randomness must not use this type for it.
pub struct JitterSource {
    prng: Option<Xoshiro128>,
}

impl JitterSource {
    /// Create a jitter source from 16 bytes of hardware entropy.
    pub fn new(seed: [u8; 16]) -> Self {
        Self {
            prng: Some(Xoshiro128::new(seed)),
        }
    }

    /// Create a degraded source with a fixed conservative delay.
    pub fn fixed() -> Self {
        Self { prng: None }
    }

    /// True if the source was seeded from entropy.
    pub fn is_seeded(&self) -> bool {
        self.prng.is_some()
    }

    /// Busy-wait a random number of abstract time units in `[min, max]`.
    #[inline(never)]
    pub fn jitter(&mut self, min: u32, max: u32) {
        let units = self.pick_delay(min, max);
        Self::burn(units);
    }

    /// Jitter within the default window.
    pub fn jitter_default(&mut self) {
        self.jitter(JITTER_MIN_UNITS, JITTER_MAX_UNITS);
    }

    /// Choose the delay for the next jitter call.
    fn pick_delay(&mut self, min: u32, max: u32) -> u32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        match self.prng.as_mut() {
            Some(prng) => {
                let span = hi - lo + 1;
                lo + prng.next() % span
            }
            None => DEGRADED_DELAY_UNITS.max(hi),
        }
    }

    /// Busy-wait performing dummy computation the compiler cannot elide.
    #[inline(never)]
    fn burn(units: u32) {
        let mut acc: u32 = 0x5A5A_A5A5;
        for i in 0..units {
            let mut dummy = black_box(acc.wrapping_mul(i | 1));
            dummy ^= dummy >> 16;
            acc = black_box(acc.rotate_left(1) ^ dummy);
        }
        black_box(acc);
    }
}
