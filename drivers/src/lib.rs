/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the driver components of the boot verification engine
    and the capability traits they consume from the SoC.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod attestation;
mod kdf;
mod key_fabric;
pub mod otp_layout;
mod puf;
mod report;
mod rollback;
mod soc;
mod tamper;
mod trng;

pub use attestation::{AttestationRecorder, BootStage, EventKind};
pub use kdf::hmac_kdf;
pub use key_fabric::{
    DerivedKey, KeyCache, KeyFabric, KeyType, UnwrappedKey, WrappedKey, KEY_SIZE, WRAP_CAPACITY,
    WRAP_NONCE_SIZE, WRAP_TAG_SIZE,
};
pub use puf::{DeviceSecret, Puf};
pub use report::{
    attestation_verifying_key, AttestationReport, EventLogEntry, EventNote, Measurement,
    SecurityStatus, MAX_EVENTS, MAX_MEASUREMENTS, MAX_WIRE_SIZE, NONCE_SIZE, NOTE_CAPACITY,
    REPORT_FORMAT_VERSION, SIGNATURE_SIZE,
};
pub use rollback::{AntiRollbackStore, RollbackStatus, Version, VersionParseError};
pub use soc::{
    Clock, DebugGate, EntropySource, FingerprintSource, OtpStore, ResetControl, Sensors,
    SocPlatform, FINGERPRINT_SIZE, ROT_STATUS_VALID,
};
pub use tamper::{MonitorState, TamperContext, TamperEvents, TamperMonitor, TamperThresholds};
pub use trng::Trng;

pub use vaultboot_error::{VaultbootError, VaultbootResult};
