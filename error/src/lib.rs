/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the library for error handling

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Vaultboot Error Type
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VaultbootError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_codes {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: VaultbootError = VaultbootError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl VaultbootError {
    /// Create a vaultboot error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get a VaultbootError from a u32 is to
    /// use `VaultbootError::try_from()` from the `TryFrom` trait impl.
    pub const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("VaultbootError cannot be 0"),
        }
    }

    /// Component identifier encoded in the upper half of the error word.
    pub const fn component_id(&self) -> u32 {
        self.0.get() >> 16
    }

    // Use the macro to define all error constants
    define_error_codes![
        (
            DRIVER_TRNG_NOT_READY,
            0x00010001,
            "Driver Error: TRNG entropy source not ready within retry budget"
        ),
        (
            DRIVER_TRNG_EMPTY_REQUEST,
            0x00010002,
            "Driver Error: TRNG request for zero bytes"
        ),
        (
            DRIVER_TAMPER_NOT_ARMED,
            0x00020001,
            "Driver Error: tamper monitor polled before arming"
        ),
        (
            DRIVER_TAMPER_BAD_THRESHOLDS,
            0x00020002,
            "Driver Error: tamper thresholds inconsistent"
        ),
        (
            DRIVER_TAMPER_EVENT_DETECTED,
            0x00020003,
            "Driver Error: tamper event detected"
        ),
        (
            DRIVER_TAMPER_GLITCH_RESET,
            0x00020004,
            "Driver Error: glitch detected, device reset requested"
        ),
        (
            DRIVER_TAMPER_ALREADY_ARMED,
            0x00020005,
            "Driver Error: tamper monitor armed twice"
        ),
        (
            DRIVER_ROLLBACK_NOT_INITIALIZED,
            0x00030001,
            "Driver Error: anti-rollback store used before init"
        ),
        (
            DRIVER_ROLLBACK_LEDGER_CORRUPT,
            0x00030002,
            "Driver Error: version ledger failed consistency scan"
        ),
        (
            DRIVER_ROLLBACK_LEDGER_FULL,
            0x00030003,
            "Driver Error: version ledger slot chain exhausted"
        ),
        (
            DRIVER_ROLLBACK_LEDGER_LOCKED,
            0x00030004,
            "Driver Error: version ledger locked for device lifetime"
        ),
        (
            DRIVER_ROLLBACK_DOWNGRADE,
            0x00030005,
            "Driver Error: candidate firmware version lower than ledger"
        ),
        (
            DRIVER_ROLLBACK_STORE_WRITE,
            0x00030006,
            "Driver Error: write-once storage rejected ledger write"
        ),
        (
            DRIVER_ROLLBACK_READBACK_MISMATCH,
            0x00030007,
            "Driver Error: ledger write readback mismatch"
        ),
        (
            DRIVER_PUF_NOT_ENROLLED,
            0x00040001,
            "Driver Error: PUF reconstruction requested before enrollment"
        ),
        (
            DRIVER_PUF_ALREADY_ENROLLED,
            0x00040002,
            "Driver Error: PUF enrollment requested twice"
        ),
        (
            DRIVER_PUF_HELPER_DATA_CORRUPT,
            0x00040003,
            "Driver Error: PUF helper data missing or corrupt"
        ),
        (
            DRIVER_PUF_DECODE_FAILURE,
            0x00040004,
            "Driver Error: PUF error correction did not converge"
        ),
        (
            DRIVER_PUF_STORE_WRITE,
            0x00040005,
            "Driver Error: write-once storage rejected helper data"
        ),
        (
            DRIVER_KEY_FABRIC_KDF_FAILURE,
            0x00050001,
            "Driver Error: keyed derivation failure"
        ),
        (
            DRIVER_KEY_FABRIC_PLAINTEXT_TOO_LARGE,
            0x00050002,
            "Driver Error: wrap request exceeds wrapped key capacity"
        ),
        (
            DRIVER_KEY_FABRIC_WRAP_FAILURE,
            0x00050003,
            "Driver Error: authenticated encryption of key failed"
        ),
        (
            DRIVER_KEY_FABRIC_UNWRAP_AUTH_FAILURE,
            0x00050004,
            "Driver Error: wrapped key authentication tag mismatch"
        ),
        (
            DRIVER_KEY_FABRIC_KEY_NOT_PRESENT,
            0x00050005,
            "Driver Error: requested key absent from key cache"
        ),
        (
            DRIVER_ATTESTATION_MEASUREMENT_LOG_FULL,
            0x00060001,
            "Driver Error: measurement log capacity exhausted"
        ),
        (
            DRIVER_ATTESTATION_EVENT_LOG_FULL,
            0x00060002,
            "Driver Error: event log capacity exhausted"
        ),
        (
            DRIVER_ATTESTATION_NOTE_TOO_LONG,
            0x00060003,
            "Driver Error: event note exceeds bounded capacity"
        ),
        (
            DRIVER_ATTESTATION_PREREQ_NOT_MET,
            0x00060004,
            "Driver Error: report generation before root-of-trust/rollback stages"
        ),
        (
            DRIVER_ATTESTATION_ALREADY_SIGNED,
            0x00060005,
            "Driver Error: report signing requested twice"
        ),
        (
            DRIVER_ATTESTATION_NOT_SIGNED,
            0x00060006,
            "Driver Error: unsigned report presented for verification"
        ),
        (
            DRIVER_ATTESTATION_SIGNATURE_INVALID,
            0x00060007,
            "Driver Error: report signature verification failure"
        ),
        (
            DRIVER_ATTESTATION_BAD_KEY,
            0x00060008,
            "Driver Error: malformed attestation verification key"
        ),
        (
            DRIVER_ATTESTATION_WIRE_BUFFER_TOO_SMALL,
            0x00060009,
            "Driver Error: report encode buffer too small"
        ),
        (
            DRIVER_ATTESTATION_WIRE_MALFORMED,
            0x0006000A,
            "Driver Error: report wire encoding malformed"
        ),
        (
            DRIVER_ATTESTATION_COUNTER_FAILURE,
            0x0006000B,
            "Driver Error: persistent boot counter increment failure"
        ),
        (
            DRIVER_ATTESTATION_EMPTY_MEASUREMENT,
            0x0006000C,
            "Driver Error: measurement over empty data"
        ),
        (
            IMAGE_VERIFIER_HEADER_MARKER_MISMATCH,
            0x00070001,
            "Image Verifier Error: header marker mismatch"
        ),
        (
            IMAGE_VERIFIER_HEADER_TOO_SHORT,
            0x00070002,
            "Image Verifier Error: image too short for header"
        ),
        (
            IMAGE_VERIFIER_SIZE_INVALID,
            0x00070003,
            "Image Verifier Error: image size out of bounds"
        ),
        (
            IMAGE_VERIFIER_ENTRY_POINT_INVALID,
            0x00070004,
            "Image Verifier Error: entry point outside load region"
        ),
        (
            IMAGE_VERIFIER_DIGEST_MISMATCH,
            0x00070005,
            "Image Verifier Error: image digest mismatch"
        ),
        (
            IMAGE_VERIFIER_SIGNATURE_INVALID,
            0x00070006,
            "Image Verifier Error: image signature invalid"
        ),
        (
            IMAGE_VERIFIER_VERIFY_FAILURE,
            0x00070007,
            "Image Verifier Error: signature verification could not run"
        ),
        (
            ROM_GLOBAL_BOOT_ALREADY_ATTEMPTED,
            0x000B0001,
            "ROM Error: second boot attempt without power cycle"
        ),
        (
            ROM_ROOT_OF_TRUST_FAILURE,
            0x000B0002,
            "ROM Error: root of trust status check failure"
        ),
        (
            ROM_TAMPER_STATUS_FAILURE,
            0x000B0003,
            "ROM Error: tamper-clear status check failure"
        ),
        (
            ROM_ROLLBACK_STATUS_FAILURE,
            0x000B0004,
            "ROM Error: anti-rollback status check failure"
        ),
        (
            ROM_SIGNATURE_STATUS_FAILURE,
            0x000B0005,
            "ROM Error: firmware signature status check failure"
        ),
        (
            ROM_TOKEN_PROGRESSION_FAILURE,
            0x000B0006,
            "ROM Error: boot token progression check failure"
        ),
        (
            ROM_TOKEN_WRITE_FAILURE,
            0x000B0007,
            "ROM Error: boot token write readback failure"
        ),
        (
            ROM_IMAGE_MALFORMED,
            0x000B0008,
            "ROM Error: firmware image malformed"
        ),
        (
            ROM_ISOLATION_NOT_CONFIGURED,
            0x000B0009,
            "ROM Error: secure world isolation not configured"
        ),
        (
            KAT_SHA256_DIGEST_MISMATCH,
            0x000C0001,
            "KAT Error: SHA-256 known answer mismatch"
        ),
        (
            KAT_HMAC256_TAG_MISMATCH,
            0x000C0002,
            "KAT Error: HMAC-SHA-256 known answer mismatch"
        ),
        (
            KAT_AES256_GCM_TAG_MISMATCH,
            0x000C0003,
            "KAT Error: AES-256-GCM known answer mismatch"
        ),
        (
            KAT_ED25519_CONSISTENCY_FAILURE,
            0x000C0004,
            "KAT Error: Ed25519 sign/verify pairwise consistency failure"
        ),
    ];
}

impl From<VaultbootError> for u32 {
    /// Converts to this type from the input type.
    fn from(val: VaultbootError) -> Self {
        val.0.get()
    }
}

impl From<VaultbootError> for NonZeroU32 {
    /// Converts to this type from the input type.
    fn from(val: VaultbootError) -> Self {
        val.0
    }
}

impl TryFrom<u32> for VaultbootError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(VaultbootError(val)),
            Err(err) => Err(err),
        }
    }
}

/// Vaultboot Result
pub type VaultbootResult<T> = Result<T, VaultbootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_codes_are_unique() {
        let constants = VaultbootError::all_constants();
        let mut seen = HashSet::new();
        for (name, value) in constants {
            assert!(seen.insert(value), "duplicate error code for {name}");
        }
    }

    #[test]
    fn test_error_code_is_never_zero() {
        for (name, value) in VaultbootError::all_constants() {
            assert_ne!(value, 0, "error code for {name} is zero");
        }
    }

    #[test]
    fn test_component_id() {
        assert_eq!(VaultbootError::DRIVER_TRNG_NOT_READY.component_id(), 0x0001);
        assert_eq!(
            VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE.component_id(),
            0x000B
        );
    }

    #[test]
    fn test_try_from() {
        assert!(VaultbootError::try_from(0).is_err());
        assert_eq!(
            VaultbootError::try_from(0x00010001).unwrap(),
            VaultbootError::DRIVER_TRNG_NOT_READY
        );
    }
}
