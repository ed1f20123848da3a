/*++

Licensed under the Apache-2.0 license.

File Name:

    state.rs

Abstract:

    File contains the boot state machine types: milestone tokens, the
    token ledger, boot states and failure reasons.

--*/

use vaultboot_cfi::{JitterSource, LayeredOutcome, LayeredVerifier, SentinelCell};
use vaultboot_drivers::AttestationReport;
use vaultboot_error::{VaultbootError, VaultbootResult};

/// Proven boot milestone.
///
/// The valid discriminants are non-binary, mutually distant words; the
/// explicit `Invalid` variant is the unset state, so no magic constant can
/// be confused with a milestone. A token is only written after its check
/// passed all redundant sub-checks, and is only ever replaced by the next
/// token in the progression.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootToken {
    Invalid = 0,
    Init = 0xA5A5_A5A5,
    RootOfTrustVerified = 0x5A5A_5A5A,
    TamperClear = 0xC3C3_C3C3,
    RollbackClear = 0x3C3C_3C3C,
    SignatureValid = 0x6969_6969,
    AttestationReady = 0x9669_6996,
    BootComplete = 0x9696_9696,
}

impl BootToken {
    /// Token that must be live before this one may be written.
    pub fn predecessor(self) -> Option<BootToken> {
        match self {
            BootToken::Invalid | BootToken::Init => None,
            BootToken::RootOfTrustVerified => Some(BootToken::Init),
            BootToken::TamperClear => Some(BootToken::RootOfTrustVerified),
            BootToken::RollbackClear => Some(BootToken::TamperClear),
            BootToken::SignatureValid => Some(BootToken::RollbackClear),
            BootToken::AttestationReady => Some(BootToken::SignatureValid),
            BootToken::BootComplete => Some(BootToken::AttestationReady),
        }
    }
}

/// The four stage tokens the final aggregate check re-verifies.
pub const STAGE_TOKEN_WORDS: [u32; 4] = [
    BootToken::RootOfTrustVerified as u32,
    BootToken::TamperClear as u32,
    BootToken::RollbackClear as u32,
    BootToken::SignatureValid as u32,
];

/// Glitch-checked holder of the live boot token plus the history of every
/// token written during this attempt.
pub struct TokenLedger {
    cell: SentinelCell,
    history: [u32; 8],
    count: usize,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self {
            cell: SentinelCell::new(),
            history: [BootToken::Invalid as u32; 8],
            count: 0,
        }
    }

    /// Write the initial token.
    pub fn begin(&mut self) -> VaultbootResult<()> {
        if self.count != 0 || !self.cell.store_checked(BootToken::Init as u32) {
            return Err(VaultbootError::ROM_TOKEN_WRITE_FAILURE);
        }
        self.history[0] = BootToken::Init as u32;
        self.count = 1;
        Ok(())
    }

    /// Advance to the next token in the progression.
    ///
    /// The live token is layered-verified against the expected
    /// predecessor, then the new token is written and immediately
    /// re-confirmed.
    pub fn advance(&mut self, jitter: &mut JitterSource, next: BootToken) -> VaultbootResult<()> {
        let expected = next
            .predecessor()
            .ok_or(VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE)?;

        let live = self.cell.load();
        let outcome = LayeredVerifier::new(jitter).confirm(live, expected as u32);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE);
        }

        if !self.cell.store_checked(next as u32) {
            return Err(VaultbootError::ROM_TOKEN_WRITE_FAILURE);
        }

        jitter.jitter_default();
        if self.cell.load() != next as u32 {
            return Err(VaultbootError::ROM_TOKEN_WRITE_FAILURE);
        }

        if self.count == self.history.len() {
            return Err(VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE);
        }
        self.history[self.count] = next as u32;
        self.count += 1;
        Ok(())
    }

    /// Live token word.
    pub fn current(&self) -> u32 {
        self.cell.load()
    }

    /// The four stage-token words recorded after `Init`, for the final
    /// aggregate check.
    pub fn verification_words(&self) -> VaultbootResult<[u32; 4]> {
        if self.count < 5 {
            return Err(VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE);
        }
        Ok([
            self.history[1],
            self.history[2],
            self.history[3],
            self.history[4],
        ])
    }
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Reason class of a failed boot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootFailureReason {
    GenericInit,
    Tamper,
    Rollback,
    SignatureInvalid,
    GlitchDetected,
    StorageExhausted,
    KeyFabricFailure,
}

impl From<VaultbootError> for BootFailureReason {
    /// Converts to this type from the input type.
    fn from(err: VaultbootError) -> Self {
        if err == VaultbootError::DRIVER_TAMPER_GLITCH_RESET {
            return BootFailureReason::GlitchDetected;
        }
        if err == VaultbootError::DRIVER_ATTESTATION_MEASUREMENT_LOG_FULL
            || err == VaultbootError::DRIVER_ATTESTATION_EVENT_LOG_FULL
        {
            return BootFailureReason::StorageExhausted;
        }
        if err == VaultbootError::ROM_TAMPER_STATUS_FAILURE {
            return BootFailureReason::Tamper;
        }
        if err == VaultbootError::ROM_ROLLBACK_STATUS_FAILURE {
            return BootFailureReason::Rollback;
        }
        if err == VaultbootError::ROM_SIGNATURE_STATUS_FAILURE {
            return BootFailureReason::SignatureInvalid;
        }

        match err.component_id() {
            0x0002 => BootFailureReason::Tamper,
            0x0003 => BootFailureReason::Rollback,
            0x0004 | 0x0005 => BootFailureReason::KeyFabricFailure,
            0x0007 => BootFailureReason::SignatureInvalid,
            _ => BootFailureReason::GenericInit,
        }
    }
}

/// Boot attempt state. Exactly one live value per power-on; `Failed` is
/// terminal until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Init,
    RootOfTrustVerified,
    TamperClear,
    RollbackClear,
    SignatureValid,
    AttestationReady,
    Success,
    Failed(BootFailureReason),
}

/// Result of a boot attempt.
#[derive(Debug)]
pub enum BootOutcome {
    /// Boot chain verified; the signed report is ready for export.
    Success(AttestationReport),

    /// Boot chain rejected. `error` carries the precise reason code.
    Failed {
        reason: BootFailureReason,
        error: VaultbootError,
    },
}
