/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the boot sequencer: the ordered, fail-closed flow from
    power-on to the signed attestation report.

--*/

use crate::kat;
use crate::rom_env::BootEnv;
use crate::state::{BootState, BootToken, TokenLedger, STAGE_TOKEN_WORDS};
use crate::verifier::RomImageVerificationEnv;
use vaultboot_cfi::{launder, JitterSource, LayeredOutcome, LayeredVerifier};
use vaultboot_drivers::{
    AntiRollbackStore, AttestationReport, BootStage, EventKind, KeyFabric, KeyType, Puf,
    RollbackStatus, SecurityStatus, SocPlatform, TamperThresholds, Version, ROT_STATUS_VALID,
};
use vaultboot_error::{VaultbootError, VaultbootResult};
use vaultboot_image_verify::{FirmwareVerifier, ImageHeader};
use zerocopy::FromBytes;

/// Identity of this boot stage, measured first.
const ROM_IDENT: &[u8] = b"VAULTBOOT_ROM_V1.0";

/// Word recorded when the isolation capability reports configured.
const ISOLATION_ACTIVE_WORD: u32 = 0x4953_4F4E;

/// Word recorded when the sticky tamper mask is empty.
const TAMPER_CLEAR_WORD: u32 = 0x434C_5230;

/// Word recorded when a rollback check returned Equal or Higher.
const ROLLBACK_CLEAR_WORD: u32 = 0x524C_4F4B;

/// Boot Flow
pub struct BootFlow {}

impl BootFlow {
    /// Execute the boot verification sequence.
    ///
    /// # Arguments
    ///
    /// * `env`   - Boot environment
    /// * `image` - Firmware image (header followed by payload)
    #[inline(never)]
    pub fn run<P: SocPlatform>(
        env: &mut BootEnv<P>,
        image: &[u8],
    ) -> VaultbootResult<AttestationReport> {
        log::info!("[boot] ++");

        // The candidate version feeds the rollback stage before the
        // signature stage authenticates it; the ledger is only committed
        // after authentication.
        let header =
            ImageHeader::read_from_prefix(image).ok_or(VaultbootError::ROM_IMAGE_MALFORMED)?;
        let payload = &image[ImageHeader::LEN..];
        let candidate = header.candidate_version();

        // Prove every primitive before trusting it.
        kat::execute_kat()?;

        Self::seed_jitter(env);

        let mut ledger = TokenLedger::new();
        ledger.begin()?;

        env.recorder
            .record_event(EventKind::BootStarted, 0, env.soc.uptime_ticks(), "cold reset")?;
        env.recorder
            .record_measurement(BootStage::Bootloader, ROM_IDENT)?;

        env.tamper.start(TamperThresholds::default())?;
        Self::drain_tamper(env)?;

        // Stage: root of trust.
        Self::verify_root_of_trust(env)?;
        ledger.advance(&mut env.jitter, BootToken::RootOfTrustVerified)?;
        env.state = BootState::RootOfTrustVerified;
        env.recorder.mark_root_of_trust_verified();
        env.recorder.record_measurement(
            BootStage::RootOfTrust,
            &env.soc.root_of_trust_status().to_le_bytes(),
        )?;
        log::info!("[boot] root of trust verified");
        Self::drain_tamper(env)?;

        // Stage: tamper clear.
        Self::verify_tamper_clear(env)?;
        ledger.advance(&mut env.jitter, BootToken::TamperClear)?;
        env.state = BootState::TamperClear;
        Self::drain_tamper(env)?;

        // Stage: anti-rollback.
        let mut rollback = AntiRollbackStore::init(&env.soc)?;
        Self::verify_rollback(env, &rollback, candidate)?;
        ledger.advance(&mut env.jitter, BootToken::RollbackClear)?;
        env.state = BootState::RollbackClear;
        env.recorder.mark_rollback_verified();
        log::info!(
            "[boot] version {} accepted against ledger {}",
            candidate,
            rollback.current()
        );
        Self::drain_tamper(env)?;

        // Stage: firmware signature.
        {
            let mut verifier = FirmwareVerifier::new(RomImageVerificationEnv::new(&env.soc));
            verifier.verify(&mut env.jitter, &header, payload)?;
        }
        ledger.advance(&mut env.jitter, BootToken::SignatureValid)?;
        env.state = BootState::SignatureValid;
        env.recorder
            .record_measurement(BootStage::Firmware, payload)?;
        Self::drain_tamper(env)?;

        // The candidate is authenticated now; advance the ledger.
        let upgraded = rollback.check(candidate) == RollbackStatus::Higher;
        rollback.commit(&mut env.soc, candidate)?;
        if upgraded {
            env.recorder.record_event(
                EventKind::RollbackCommitted,
                candidate.to_word(),
                env.soc.uptime_ticks(),
                "version ledger advanced",
            )?;
        }

        // Keys: enroll on first boot, then rebuild the device secret.
        if !Puf::is_enrolled(&env.soc) {
            Puf::enroll(&mut env.trng, &mut env.soc)?;
            env.recorder.record_event(
                EventKind::EnrollmentCompleted,
                0,
                env.soc.uptime_ticks(),
                "puf helper data enrolled",
            )?;
        }
        {
            let secret = Puf::reconstruct(&mut env.soc)?;
            let attestation_key = KeyFabric::derive(&secret, KeyType::Attestation)?;
            env.keys.store(attestation_key);
            // `secret` zeroizes on drop here.
        }
        Self::drain_tamper(env)?;

        // Debug lockdown before the report captures the posture.
        if !env.soc.debug_locked() {
            env.soc.lock_debug_port();
        }
        env.recorder.record_event(
            EventKind::DebugLocked,
            1,
            env.soc.uptime_ticks(),
            "debug port locked",
        )?;

        let security_status = Self::security_status(env, &rollback);
        env.recorder.record_measurement(
            BootStage::SecureConfig,
            &security_status.bits().to_le_bytes(),
        )?;

        // Stage: attestation. A dead entropy source is fatal here: the
        // nonce must be cryptographically fresh.
        let nonce = env.trng.generate_array(&mut env.soc)?;
        let mut report = env.recorder.generate(
            &mut env.soc,
            nonce,
            candidate,
            security_status,
            env.tamper_ctx.event_count(),
        )?;
        ledger.advance(&mut env.jitter, BootToken::AttestationReady)?;
        env.state = BootState::AttestationReady;

        let attestation_key = env
            .keys
            .get(KeyType::Attestation)
            .ok_or(VaultbootError::DRIVER_KEY_FABRIC_KEY_NOT_PRESENT)?;
        report.sign(attestation_key)?;
        Self::drain_tamper(env)?;

        // Final aggregate: re-verify the whole token progression.
        let tokens = ledger.verification_words()?;
        let outcome = LayeredVerifier::new(&mut env.jitter).verify_words(&tokens, &STAGE_TOKEN_WORDS);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::ROM_TOKEN_PROGRESSION_FAILURE);
        }
        ledger.advance(&mut env.jitter, BootToken::BootComplete)?;

        log::info!("[boot] --");
        Ok(report)
    }

    /// Seed the jitter source from hardware entropy. A stalled source
    /// degrades jitter to a fixed conservative delay; it does not fail the
    /// boot by itself.
    fn seed_jitter<P: SocPlatform>(env: &mut BootEnv<P>) {
        match env.trng.generate_array(&mut env.soc) {
            Ok(seed) => env.jitter = JitterSource::new(seed),
            Err(_) => {
                log::warn!("[boot] entropy not ready, jitter degraded");
                env.jitter = JitterSource::fixed();
            }
        }
    }

    /// Poll the monitor and drain the event mailbox between boot steps.
    ///
    /// Any pending event fails the boot; a glitch additionally forces a
    /// platform reset through the response path.
    fn drain_tamper<P: SocPlatform>(env: &mut BootEnv<P>) -> VaultbootResult<()> {
        let polled = env.tamper.poll(&mut env.soc, &env.tamper_ctx)?;
        let events = polled | env.tamper_ctx.take_pending();
        if events.is_empty() {
            return Ok(());
        }

        // Forensics first; the response below may never return control.
        let _ = env.recorder.record_event(
            EventKind::TamperAlert,
            events.bits(),
            env.soc.uptime_ticks(),
            "tamper event during boot",
        );

        env.tamper
            .respond(events, &env.tamper_ctx, &mut env.keys, &mut env.soc)?;
        Err(VaultbootError::DRIVER_TAMPER_EVENT_DETECTED)
    }

    /// Layered check of the immutable first-stage status and the
    /// isolation capability.
    fn verify_root_of_trust<P: SocPlatform>(env: &mut BootEnv<P>) -> VaultbootResult<()> {
        env.jitter.jitter_default();
        if !env.soc.isolation_configured() {
            return Err(VaultbootError::ROM_ISOLATION_NOT_CONFIGURED);
        }

        let status = env.soc.root_of_trust_status();
        let isolation_word = if launder(env.soc.isolation_configured()) {
            ISOLATION_ACTIVE_WORD
        } else {
            0
        };

        let outcome = LayeredVerifier::new(&mut env.jitter).verify_words(
            &[status, isolation_word],
            &[ROT_STATUS_VALID, ISOLATION_ACTIVE_WORD],
        );
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::ROM_ROOT_OF_TRUST_FAILURE);
        }

        env.jitter.jitter_default();
        Ok(())
    }

    /// Layered check that the sticky tamper mask is still empty.
    fn verify_tamper_clear<P: SocPlatform>(env: &mut BootEnv<P>) -> VaultbootResult<()> {
        env.jitter.jitter_default();
        let first = Self::tamper_clear_word(env);
        env.jitter.jitter_default();
        let second = Self::tamper_clear_word(env);

        let outcome = LayeredVerifier::new(&mut env.jitter)
            .verify_words(&[first, second], &[TAMPER_CLEAR_WORD, TAMPER_CLEAR_WORD]);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::ROM_TAMPER_STATUS_FAILURE);
        }
        env.jitter.jitter_default();
        Ok(())
    }

    fn tamper_clear_word<P: SocPlatform>(env: &BootEnv<P>) -> u32 {
        if env.tamper_ctx.sticky_events().is_empty() && !env.tamper_ctx.locked() {
            TAMPER_CLEAR_WORD
        } else {
            0
        }
    }

    /// Layered anti-rollback check: the domain comparison runs twice and
    /// both results must agree.
    fn verify_rollback<P: SocPlatform>(
        env: &mut BootEnv<P>,
        rollback: &AntiRollbackStore,
        candidate: Version,
    ) -> VaultbootResult<()> {
        env.jitter.jitter_default();
        let first = Self::rollback_word(rollback.check(candidate));
        env.jitter.jitter_default();
        let second = Self::rollback_word(rollback.check(candidate));

        let outcome = LayeredVerifier::new(&mut env.jitter)
            .verify_words(&[first, second], &[ROLLBACK_CLEAR_WORD, ROLLBACK_CLEAR_WORD]);
        if outcome != LayeredOutcome::AllValid {
            return Err(VaultbootError::ROM_ROLLBACK_STATUS_FAILURE);
        }
        env.jitter.jitter_default();
        Ok(())
    }

    fn rollback_word(status: RollbackStatus) -> u32 {
        match status {
            RollbackStatus::Equal | RollbackStatus::Higher => ROLLBACK_CLEAR_WORD,
            RollbackStatus::Fail => 0,
        }
    }

    /// Security posture captured by the report.
    fn security_status<P: SocPlatform>(
        env: &BootEnv<P>,
        rollback: &AntiRollbackStore,
    ) -> SecurityStatus {
        let mut status = SecurityStatus::ROOT_OF_TRUST_VERIFIED
            | SecurityStatus::ANTI_ROLLBACK_ENFORCED
            | SecurityStatus::TAMPER_MONITORING;
        if env.soc.isolation_configured() {
            status |= SecurityStatus::ISOLATION_ACTIVE;
        }
        if env.soc.debug_locked() {
            status |= SecurityStatus::DEBUG_LOCKED;
        }
        if Puf::is_enrolled(&env.soc) {
            status |= SecurityStatus::PUF_ENROLLED;
        }
        if rollback.is_locked() {
            status |= SecurityStatus::LEDGER_LOCKED;
        }
        status
    }
}
