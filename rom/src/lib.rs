/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the boot sequencer library and the single entry point of
    the secure boot engine.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod flow;
mod kat;
mod rom_env;
mod state;
mod verifier;

pub use flow::BootFlow;
pub use kat::execute_kat;
pub use rom_env::BootEnv;
pub use state::{
    BootFailureReason, BootOutcome, BootState, BootToken, TokenLedger, STAGE_TOKEN_WORDS,
};
pub use verifier::RomImageVerificationEnv;

use vaultboot_drivers::SocPlatform;
use vaultboot_error::VaultbootError;

/// Execute the secure boot sequence.
///
/// The single outward entry point. `Failed` is terminal: a second call on
/// the same environment is rejected until the next power-on.
pub fn execute_secure_boot<P: SocPlatform>(env: &mut BootEnv<P>, image: &[u8]) -> BootOutcome {
    if env.attempted {
        let error = VaultbootError::ROM_GLOBAL_BOOT_ALREADY_ATTEMPTED;
        return BootOutcome::Failed {
            reason: error.into(),
            error,
        };
    }
    env.attempted = true;

    match BootFlow::run(env, image) {
        Ok(report) => {
            env.state = BootState::Success;
            BootOutcome::Success(report)
        }
        Err(error) => {
            let reason = BootFailureReason::from(error);
            env.state = BootState::Failed(reason);
            log::error!("[boot] failed, error 0x{:08x}", u32::from(error));
            BootOutcome::Failed { reason, error }
        }
    }
}
