/*++

Licensed under the Apache-2.0 license.

File Name:

    otp_layout.rs

Abstract:

    File contains the word-slot and counter map of the write-once store.

--*/

/// First helper-data slot of the PUF fuzzy extractor.
pub const PUF_HELPER_BASE_SLOT: usize = 0;

/// Helper data length in words (64 bytes).
pub const PUF_HELPER_WORDS: usize = 16;

/// PUF enrollment-complete flag slot.
pub const PUF_ENROLLED_SLOT: usize = 16;

/// Value programmed into [`PUF_ENROLLED_SLOT`] at enrollment.
pub const PUF_ENROLLED_MAGIC: u32 = 0x454E_524C;

/// Permanent tamper lock flag slot.
pub const TAMPER_LOCK_SLOT: usize = 17;

/// Value programmed into [`TAMPER_LOCK_SLOT`] when the device locks.
pub const TAMPER_LOCK_MAGIC: u32 = 0x4C4F_434B;

/// Version-ledger lock flag slot.
pub const ROLLBACK_LOCK_SLOT: usize = 18;

/// Value programmed into [`ROLLBACK_LOCK_SLOT`] by `lock()`.
pub const ROLLBACK_LOCK_MAGIC: u32 = 0x524C_424B;

/// First slot of the anti-rollback version chain.
pub const VERSION_CHAIN_BASE_SLOT: usize = 24;

/// Number of slots in the version chain; one slot burns per accepted
/// version upgrade.
pub const VERSION_CHAIN_SLOTS: usize = 32;

/// Monotonic counter index of the persistent boot counter.
pub const BOOT_COUNTER_INDEX: usize = 0;
