/*++

Licensed under the Apache-2.0 license.

File Name:

    attestation.rs

Abstract:

    File contains API for the measured-boot attestation recorder: bounded
    append-only measurement and event logs and report generation.

--*/

use crate::otp_layout::BOOT_COUNTER_INDEX;
use crate::report::{
    AttestationReport, EventLogEntry, EventNote, Measurement, SecurityStatus, MAX_EVENTS,
    MAX_MEASUREMENTS, NONCE_SIZE, REPORT_FORMAT_VERSION, SIGNATURE_SIZE,
};
use crate::rollback::Version;
use crate::soc::{Clock, OtpStore};
use sha2::{Digest, Sha256};
use vaultboot_error::{VaultbootError, VaultbootResult};

/// Boot stage identifier of a measurement.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    Bootloader = 1,
    RootOfTrust = 2,
    SecureConfig = 3,
    Firmware = 4,
    Application = 5,
}

impl From<BootStage> for u32 {
    /// Converts to this type from the input type.
    fn from(stage: BootStage) -> Self {
        stage as Self
    }
}

/// Event log entry type.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BootStarted = 1,
    EnrollmentCompleted = 2,
    RollbackCommitted = 3,
    DebugLocked = 4,
    TamperAlert = 5,
    SelfTestPassed = 6,
}

impl From<EventKind> for u32 {
    /// Converts to this type from the input type.
    fn from(kind: EventKind) -> Self {
        kind as Self
    }
}

/// Measured-boot recorder.
///
/// Both logs are bounded and append-only: a full log is a hard error,
/// never a silent drop.
pub struct AttestationRecorder {
    measurements: [Measurement; MAX_MEASUREMENTS],
    measurement_count: usize,
    events: [EventLogEntry; MAX_EVENTS],
    event_count: usize,
    root_of_trust_ok: bool,
    rollback_ok: bool,
}

impl AttestationRecorder {
    /// Create a recorder with empty logs.
    pub fn new() -> Self {
        Self {
            measurements: [Measurement::default(); MAX_MEASUREMENTS],
            measurement_count: 0,
            events: [EventLogEntry::default(); MAX_EVENTS],
            event_count: 0,
            root_of_trust_ok: false,
            rollback_ok: false,
        }
    }

    /// Hash `data` and append the digest to the measurement log.
    pub fn record_measurement(&mut self, stage: BootStage, data: &[u8]) -> VaultbootResult<()> {
        if data.is_empty() {
            return Err(VaultbootError::DRIVER_ATTESTATION_EMPTY_MEASUREMENT);
        }
        if self.measurement_count == MAX_MEASUREMENTS {
            return Err(VaultbootError::DRIVER_ATTESTATION_MEASUREMENT_LOG_FULL);
        }

        self.measurements[self.measurement_count] = Measurement {
            stage: stage.into(),
            digest: Sha256::digest(data).into(),
        };
        self.measurement_count += 1;
        Ok(())
    }

    /// Append an entry to the event log.
    pub fn record_event(
        &mut self,
        kind: EventKind,
        data: u32,
        timestamp: u64,
        note: &str,
    ) -> VaultbootResult<()> {
        if self.event_count == MAX_EVENTS {
            return Err(VaultbootError::DRIVER_ATTESTATION_EVENT_LOG_FULL);
        }

        self.events[self.event_count] = EventLogEntry {
            kind: kind.into(),
            data,
            timestamp,
            note: EventNote::new(note)?,
        };
        self.event_count += 1;
        Ok(())
    }

    /// Record that the root-of-trust stage passed its layered check.
    pub fn mark_root_of_trust_verified(&mut self) {
        self.root_of_trust_ok = true;
    }

    /// Record that the anti-rollback stage passed its layered check.
    pub fn mark_rollback_verified(&mut self) {
        self.rollback_ok = true;
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements[..self.measurement_count]
    }

    pub fn events(&self) -> &[EventLogEntry] {
        &self.events[..self.event_count]
    }

    /// Snapshot the logs into a freshness-bound report.
    ///
    /// Fails unless the root-of-trust and rollback stages succeeded.
    /// Increments the persistent boot counter.
    pub fn generate<S: OtpStore + Clock>(
        &self,
        soc: &mut S,
        nonce: [u8; NONCE_SIZE],
        firmware_version: Version,
        security_status: SecurityStatus,
        tamper_events: u32,
    ) -> VaultbootResult<AttestationReport> {
        if !self.root_of_trust_ok || !self.rollback_ok {
            return Err(VaultbootError::DRIVER_ATTESTATION_PREREQ_NOT_MET);
        }

        if !soc.counter_increment(BOOT_COUNTER_INDEX) {
            return Err(VaultbootError::DRIVER_ATTESTATION_COUNTER_FAILURE);
        }

        Ok(AttestationReport {
            version: REPORT_FORMAT_VERSION,
            nonce,
            boot_count: soc.counter_value(BOOT_COUNTER_INDEX),
            firmware_version,
            security_status,
            tamper_events,
            uptime: soc.uptime_ticks(),
            measurements: self.measurements,
            measurement_count: self.measurement_count,
            events: self.events,
            event_count: self.event_count,
            signature: [0u8; SIGNATURE_SIZE],
            signed: false,
        })
    }
}

impl Default for AttestationRecorder {
    fn default() -> Self {
        Self::new()
    }
}
