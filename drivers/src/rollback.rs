/*++

Licensed under the Apache-2.0 license.

File Name:

    rollback.rs

Abstract:

    File contains API for the anti-rollback version ledger backed by
    write-once storage.

--*/

use crate::otp_layout::{
    ROLLBACK_LOCK_MAGIC, ROLLBACK_LOCK_SLOT, VERSION_CHAIN_BASE_SLOT, VERSION_CHAIN_SLOTS,
};
use crate::soc::OtpStore;
use vaultboot_error::{VaultbootError, VaultbootResult};

/// Firmware version, totally ordered lexicographically.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u16,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Packed wire form: `major << 24 | minor << 16 | patch`.
    pub fn to_word(self) -> u32 {
        (self.major as u32) << 24 | (self.minor as u32) << 16 | self.patch as u32
    }

    pub fn from_word(word: u32) -> Self {
        Self {
            major: (word >> 24) as u8,
            minor: (word >> 16) as u8,
            patch: word as u16,
        }
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error parsing a `major.minor.patch` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionParseError;

impl core::str::FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let major = parts.next().ok_or(VersionParseError)?;
        let minor = parts.next().ok_or(VersionParseError)?;
        let patch = parts.next().ok_or(VersionParseError)?;
        if parts.next().is_some() {
            return Err(VersionParseError);
        }
        Ok(Self {
            major: major.parse().map_err(|_| VersionParseError)?,
            minor: minor.parse().map_err(|_| VersionParseError)?,
            patch: patch.parse().map_err(|_| VersionParseError)?,
        })
    }
}

/// Result of comparing a candidate version against the ledger.
///
/// Non-binary discriminants so a single flipped word cannot turn a failed
/// check into a passing one.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStatus {
    /// Candidate is older than the ledger. Terminal for the boot attempt.
    Fail = 0x55AA_55AA,

    /// Candidate matches the ledger exactly.
    Equal = 0x33CC_33CC,

    /// Candidate is newer than the ledger.
    Higher = 0xCC33_33CC,
}

/// Monotonic version ledger.
///
/// The ledger is an append-only chain of packed version words in
/// write-once slots. The stored version is the last programmed slot; an
/// accepted upgrade burns the next slot and can never be undone.
pub struct AntiRollbackStore {
    current: Version,
    next_free_slot: usize,
    locked: bool,
}

impl AntiRollbackStore {
    /// Establish or validate the ledger from the write-once store.
    pub fn init(soc: &impl OtpStore) -> VaultbootResult<Self> {
        let mut current = Version::default();
        let mut next_free_slot = VERSION_CHAIN_BASE_SLOT;
        let mut chain_ended = false;

        for slot in VERSION_CHAIN_BASE_SLOT..VERSION_CHAIN_BASE_SLOT + VERSION_CHAIN_SLOTS {
            match soc.read_word(slot) {
                Some(word) => {
                    // A programmed slot after a gap means the chain was
                    // manipulated.
                    if chain_ended {
                        return Err(VaultbootError::DRIVER_ROLLBACK_LEDGER_CORRUPT);
                    }
                    let version = Version::from_word(word);
                    if slot != VERSION_CHAIN_BASE_SLOT && version <= current {
                        return Err(VaultbootError::DRIVER_ROLLBACK_LEDGER_CORRUPT);
                    }
                    current = version;
                    next_free_slot = slot + 1;
                }
                None => chain_ended = true,
            }
        }

        let locked = soc.read_word(ROLLBACK_LOCK_SLOT).is_some();

        Ok(Self {
            current,
            next_free_slot,
            locked,
        })
    }

    /// Version currently recorded in the ledger.
    pub fn current(&self) -> Version {
        self.current
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Compare a candidate against the stored version.
    pub fn check(&self, candidate: Version) -> RollbackStatus {
        if candidate < self.current {
            RollbackStatus::Fail
        } else if candidate == self.current {
            RollbackStatus::Equal
        } else {
            RollbackStatus::Higher
        }
    }

    /// Record an accepted candidate version.
    ///
    /// Idempotent for an equal version; irreversible for a higher one. A
    /// candidate that fails `check` is rejected here as well.
    pub fn commit(&mut self, soc: &mut impl OtpStore, candidate: Version) -> VaultbootResult<()> {
        match self.check(candidate) {
            RollbackStatus::Fail => Err(VaultbootError::DRIVER_ROLLBACK_DOWNGRADE),
            RollbackStatus::Equal => Ok(()),
            RollbackStatus::Higher => {
                if self.locked {
                    return Err(VaultbootError::DRIVER_ROLLBACK_LEDGER_LOCKED);
                }
                if self.next_free_slot >= VERSION_CHAIN_BASE_SLOT + VERSION_CHAIN_SLOTS {
                    return Err(VaultbootError::DRIVER_ROLLBACK_LEDGER_FULL);
                }

                let word = candidate.to_word();
                if !soc.write_once(self.next_free_slot, word) {
                    return Err(VaultbootError::DRIVER_ROLLBACK_STORE_WRITE);
                }
                if soc.read_word(self.next_free_slot) != Some(word) {
                    return Err(VaultbootError::DRIVER_ROLLBACK_READBACK_MISMATCH);
                }

                self.current = candidate;
                self.next_free_slot += 1;
                log::info!("[rollback] ledger advanced to {}", candidate);
                Ok(())
            }
        }
    }

    /// Make the ledger permanently read-only for the rest of device life.
    pub fn lock(&mut self, soc: &mut impl OtpStore) -> VaultbootResult<()> {
        if !self.locked && !soc.write_once(ROLLBACK_LOCK_SLOT, ROLLBACK_LOCK_MAGIC) {
            return Err(VaultbootError::DRIVER_ROLLBACK_STORE_WRITE);
        }
        self.locked = true;
        Ok(())
    }
}
