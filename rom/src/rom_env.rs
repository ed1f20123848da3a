/*++

Licensed under the Apache-2.0 license.

File Name:

    rom_env.rs

Abstract:

    File implements a context holding all the services utilized by the
    boot sequencer. The primary need for this abstraction is to hide the
    platform details from the boot flow. The natural side benefit of this
    abstraction is it makes authoring mocks and unit tests easy.

--*/

use crate::state::BootState;
use vaultboot_cfi::JitterSource;
use vaultboot_drivers::{
    AttestationRecorder, KeyCache, SocPlatform, TamperContext, TamperMonitor, Trng,
};

/// Boot Context
pub struct BootEnv<P: SocPlatform> {
    /// SoC capabilities
    pub soc: P,

    /// True random number generator
    pub trng: Trng,

    /// Jitter source; reseeded from hardware entropy early in the flow
    pub jitter: JitterSource,

    /// Tamper monitor
    pub tamper: TamperMonitor,

    /// Tamper context shared with the sampling path
    pub tamper_ctx: TamperContext,

    /// Attestation recorder
    pub recorder: AttestationRecorder,

    /// Working-memory key material
    pub keys: KeyCache,

    /// Boot attempt state
    pub state: BootState,

    /// One boot attempt per power-on
    pub(crate) attempted: bool,
}

impl<P: SocPlatform> BootEnv<P> {
    pub fn new(soc: P) -> Self {
        Self {
            soc,
            trng: Trng::new(),
            jitter: JitterSource::fixed(),
            tamper: TamperMonitor::new(),
            tamper_ctx: TamperContext::new(),
            recorder: AttestationRecorder::new(),
            keys: KeyCache::new(),
            state: BootState::Init,
            attempted: false,
        }
    }
}
