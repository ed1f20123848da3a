/*++

Licensed under the Apache-2.0 license.

File Name:

    soc.rs

Abstract:

    File contains the capability traits through which the boot core reaches
    the SoC. The primary need for this abstraction is to hide the hardware
    details from the verification logic. The natural side benefit is it
    makes authoring mocks and unit tests easy.

--*/

/// Size of a raw fingerprint reading in bytes.
pub const FINGERPRINT_SIZE: usize = 64;

/// Status word an intact immutable first-stage verifier reports.
pub const ROT_STATUS_VALID: u32 = 0x5254_534C;

/// Voltage and temperature sensing.
pub trait Sensors {
    /// Read the current supply voltage in millivolts.
    fn read_voltage_mv(&mut self) -> u32;

    /// Read the current die temperature in degrees Celsius.
    fn read_temperature_c(&mut self) -> i32;
}

/// Raw hardware entropy.
pub trait EntropySource {
    /// Fill `dest` with hardware random bytes.
    ///
    /// Returns false when the source is not ready yet; the caller owns the
    /// retry budget.
    fn try_fill(&mut self, dest: &mut [u8]) -> bool;
}

/// Physically unclonable fingerprint readout. Readings are noisy and
/// device-unique; stability comes from the fuzzy extractor, not from here.
pub trait FingerprintSource {
    fn read_raw_fingerprint(&mut self, dest: &mut [u8; FINGERPRINT_SIZE]);
}

/// Write-once word storage with monotonic counters.
///
/// A slot transitions from unprogrammed to programmed exactly once;
/// counters only move forward. Irreversibility is enforced by hardware.
pub trait OtpStore {
    /// Read a word slot. `None` when the slot was never programmed.
    fn read_word(&self, slot: usize) -> Option<u32>;

    /// Program a word slot. Returns false if the slot is already
    /// programmed or the store rejects the write.
    fn write_once(&mut self, slot: usize, value: u32) -> bool;

    /// Current value of a monotonic counter.
    fn counter_value(&self, index: usize) -> u32;

    /// Increment a monotonic counter. Returns false on exhaustion.
    fn counter_increment(&mut self, index: usize) -> bool;
}

/// Certificate-gated debug port. Unlocking is handled outside the core;
/// the core only queries and asserts the lock.
pub trait DebugGate {
    fn debug_locked(&self) -> bool;

    fn lock_debug_port(&mut self);
}

/// System reset request line.
///
/// Hardware implementations do not return from `trigger_reset`; host-side
/// models record the request so the caller's fatal path stays observable.
pub trait ResetControl {
    fn trigger_reset(&mut self);
}

/// Monotonic time since power-on in abstract ticks.
pub trait Clock {
    fn uptime_ticks(&self) -> u64;
}

/// The full set of SoC capabilities the boot core consumes.
pub trait SocPlatform:
    Sensors + EntropySource + FingerprintSource + OtpStore + DebugGate + ResetControl + Clock
{
    /// Status word of the immutable first-stage verifier.
    fn root_of_trust_status(&self) -> u32;

    /// True when the secure/non-secure isolation split was configured
    /// before the core started. The core relies on it, never sets it up.
    fn isolation_configured(&self) -> bool;

    /// Vendor public key provisioned in fuses at manufacturing.
    fn vendor_pub_key(&self) -> [u8; 32];
}
