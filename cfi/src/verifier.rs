/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    File contains the layered verification primitive. Every yes/no security
    decision in the boot path goes through this check so that a single
    transient fault cannot flip the outcome.

--*/

use crate::jitter::JitterSource;
use crate::sentinel::{launder, SentinelCell};

/// Maximum number of independent facts a single layered check may cover.
pub const MAX_LAYERED_FACTS: usize = 8;

/// Per-fact confirmation sentinels. Non-binary, mutually distant values so
/// neither an all-zero nor an all-one fault produces a valid sentinel.
const FACT_SENTINELS: [u32; MAX_LAYERED_FACTS] = [
    0xA5A5_C33C,
    0x5A5A_3CC3,
    0xC3C3_A55A,
    0x3C3C_5AA5,
    0x9669_C33C,
    0x6996_3CC3,
    0xAA55_C33C,
    0x55AA_3CC3,
];

/// Outcome of a layered verification.
///
/// The discriminants are deliberately non-binary: a fault that zeroes or
/// saturates the outcome word yields neither variant.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayeredOutcome {
    /// At least one fact, redundant check, or the aggregate pass failed.
    Invalid = 0xA53C_C35A,

    /// Every fact, every redundant check, and the aggregate pass held.
    AllValid = 0x5AC3_3CA5,
}

/// Layered, glitch-resistant multi-fact verifier.
///
/// For a decision over `K` facts the check requires corrupting `K + 1`
/// independently timed points, each preceded by an unpredictable delay:
/// every fact comparison, every sentinel write-back, and the final
/// aggregate re-comparison of the original inputs.
pub struct LayeredVerifier<'a> {
    jitter: &'a mut JitterSource,
}

impl<'a> LayeredVerifier<'a> {
    pub fn new(jitter: &'a mut JitterSource) -> Self {
        Self { jitter }
    }

    /// Verify that every `actual` word equals its `expected` counterpart.
    ///
    /// Fails fast: the first miss returns [`LayeredOutcome::Invalid`]
    /// without evaluating the remaining facts.
    #[inline(never)]
    pub fn verify_words(&mut self, actual: &[u32], expected: &[u32]) -> LayeredOutcome {
        if actual.is_empty() || actual.len() != expected.len() || actual.len() > MAX_LAYERED_FACTS {
            return LayeredOutcome::Invalid;
        }

        let mut cell = SentinelCell::new();

        for (i, (&fact, &reference)) in actual.iter().zip(expected.iter()).enumerate() {
            self.jitter.jitter_default();
            if launder(fact) != reference {
                return LayeredOutcome::Invalid;
            }

            // Confirm the sentinel write itself landed.
            if !cell.store_checked(FACT_SENTINELS[i]) {
                return LayeredOutcome::Invalid;
            }

            self.jitter.jitter_default();
            if cell.load() != FACT_SENTINELS[i] {
                return LayeredOutcome::Invalid;
            }
        }

        // Aggregate pass: re-verify the original inputs, not the sentinels.
        self.jitter.jitter_default();
        for (&fact, &reference) in actual.iter().zip(expected.iter()) {
            if launder(fact) != launder(reference) {
                return LayeredOutcome::Invalid;
            }
        }

        if cell.load() != FACT_SENTINELS[actual.len() - 1] {
            return LayeredOutcome::Invalid;
        }

        LayeredOutcome::AllValid
    }

    /// Single-fact convenience wrapper.
    pub fn confirm(&mut self, actual: u32, expected: u32) -> LayeredOutcome {
        self.verify_words(&[actual], &[expected])
    }
}
