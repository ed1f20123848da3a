/*++

Licensed under the Apache-2.0 license.

File Name:

    tamper.rs

Abstract:

    File contains API for the voltage/temperature tamper monitor and the
    shared tamper context.

--*/

use crate::key_fabric::KeyCache;
use crate::otp_layout::{TAMPER_LOCK_MAGIC, TAMPER_LOCK_SLOT};
use crate::soc::{DebugGate, OtpStore, ResetControl, Sensors};
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use vaultboot_error::{VaultbootError, VaultbootResult};

bitflags::bitflags! {
    /// Tamper event bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TamperEvents: u32 {
        const VOLTAGE_LOW  = 0x01;
        const VOLTAGE_HIGH = 0x02;
        const TEMP_LOW     = 0x04;
        const TEMP_HIGH    = 0x08;
        const GLITCH       = 0x10;
    }
}

/// Watcher bounds and the single-sample glitch threshold.
#[derive(Debug, Clone, Copy)]
pub struct TamperThresholds {
    pub voltage_low_mv: u32,
    pub voltage_high_mv: u32,
    pub temp_low_c: i32,
    pub temp_high_c: i32,
    /// Maximum allowed voltage delta between two consecutive samples.
    pub glitch_delta_mv: u32,
}

impl Default for TamperThresholds {
    fn default() -> Self {
        Self {
            voltage_low_mv: 1700,
            voltage_high_mv: 2000,
            temp_low_c: -40,
            temp_high_c: 85,
            glitch_delta_mv: 200,
        }
    }
}

/// Tamper state shared between the sampling path and the boot sequencer.
///
/// All fields are atomic: the sampling path may preempt the sequencer at
/// any instruction boundary, and a torn read here would be equivalent to a
/// fault injection. Never reset except at power-on.
pub struct TamperContext {
    last_voltage_mv: AtomicU32,
    last_temp_c: AtomicI32,
    event_count: AtomicU32,
    sticky_events: AtomicU32,
    /// Single-slot mailbox the sequencer drains between boot steps.
    pending_events: AtomicU32,
    locked: AtomicBool,
}

impl TamperContext {
    pub fn new() -> Self {
        Self {
            last_voltage_mv: AtomicU32::new(0),
            last_temp_c: AtomicI32::new(0),
            event_count: AtomicU32::new(0),
            sticky_events: AtomicU32::new(0),
            pending_events: AtomicU32::new(0),
            locked: AtomicBool::new(false),
        }
    }

    fn record_sample(&self, voltage_mv: u32, temp_c: i32) {
        self.last_voltage_mv.store(voltage_mv, Ordering::SeqCst);
        self.last_temp_c.store(temp_c, Ordering::SeqCst);
    }

    fn post_events(&self, events: TamperEvents) {
        self.sticky_events.fetch_or(events.bits(), Ordering::SeqCst);
        self.pending_events
            .fetch_or(events.bits(), Ordering::SeqCst);
        self.event_count
            .fetch_add(events.bits().count_ones(), Ordering::SeqCst);
    }

    /// Drain the pending-event mailbox.
    pub fn take_pending(&self) -> TamperEvents {
        TamperEvents::from_bits_retain(self.pending_events.swap(0, Ordering::SeqCst))
    }

    pub fn sticky_events(&self) -> TamperEvents {
        TamperEvents::from_bits_retain(self.sticky_events.load(Ordering::SeqCst))
    }

    pub fn event_count(&self) -> u32 {
        self.event_count.load(Ordering::SeqCst)
    }

    pub fn last_voltage_mv(&self) -> u32 {
        self.last_voltage_mv.load(Ordering::SeqCst)
    }

    pub fn last_temperature_c(&self) -> i32 {
        self.last_temp_c.load(Ordering::SeqCst)
    }

    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn set_locked(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }
}

impl Default for TamperContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Monitor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Uninitialized,
    Armed,
    Tripped,
}

/// Voltage/temperature tamper monitor.
pub struct TamperMonitor {
    state: MonitorState,
    thresholds: TamperThresholds,
    have_baseline: bool,
    glitch_tripped: bool,
}

impl TamperMonitor {
    pub fn new() -> Self {
        Self {
            state: MonitorState::Uninitialized,
            thresholds: TamperThresholds::default(),
            have_baseline: false,
            glitch_tripped: false,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Arm the voltage and temperature watchers.
    pub fn start(&mut self, thresholds: TamperThresholds) -> VaultbootResult<()> {
        if self.state != MonitorState::Uninitialized {
            return Err(VaultbootError::DRIVER_TAMPER_ALREADY_ARMED);
        }
        if thresholds.voltage_low_mv >= thresholds.voltage_high_mv
            || thresholds.temp_low_c >= thresholds.temp_high_c
            || thresholds.glitch_delta_mv == 0
        {
            return Err(VaultbootError::DRIVER_TAMPER_BAD_THRESHOLDS);
        }

        self.thresholds = thresholds;
        self.state = MonitorState::Armed;
        Ok(())
    }

    /// Sample both sensors, update the shared context and classify.
    ///
    /// Called from the interrupt path and from the sequencer between boot
    /// steps. Once glitch-tripped, every poll reports GLITCH without
    /// touching the sensors again.
    pub fn poll(
        &mut self,
        sensors: &mut impl Sensors,
        ctx: &TamperContext,
    ) -> VaultbootResult<TamperEvents> {
        if self.state == MonitorState::Uninitialized {
            return Err(VaultbootError::DRIVER_TAMPER_NOT_ARMED);
        }
        if self.glitch_tripped {
            return Ok(TamperEvents::GLITCH);
        }

        let voltage_mv = sensors.read_voltage_mv();
        let temp_c = sensors.read_temperature_c();

        let mut events = TamperEvents::empty();
        if voltage_mv < self.thresholds.voltage_low_mv {
            events |= TamperEvents::VOLTAGE_LOW;
        }
        if voltage_mv > self.thresholds.voltage_high_mv {
            events |= TamperEvents::VOLTAGE_HIGH;
        }
        if temp_c < self.thresholds.temp_low_c {
            events |= TamperEvents::TEMP_LOW;
        }
        if temp_c > self.thresholds.temp_high_c {
            events |= TamperEvents::TEMP_HIGH;
        }

        // A step larger than the glitch threshold flags GLITCH regardless
        // of whether either sample was itself out of bounds.
        if self.have_baseline {
            let delta = voltage_mv.abs_diff(ctx.last_voltage_mv());
            if delta > self.thresholds.glitch_delta_mv {
                events |= TamperEvents::GLITCH;
            }
        }

        ctx.record_sample(voltage_mv, temp_c);
        self.have_baseline = true;

        if !events.is_empty() {
            ctx.post_events(events);
            self.state = MonitorState::Tripped;
            if events.contains(TamperEvents::GLITCH) {
                self.glitch_tripped = true;
                log::error!("[tamper] glitch delta detected");
            } else {
                log::warn!("[tamper] events 0x{:02x}", events.bits());
            }
        }

        Ok(events)
    }

    /// Apply the tamper response policy.
    ///
    /// Execution order is fixed: erase keys, then lock, then reset, so a
    /// reset never races a pending key erasure. The GLITCH path requests a
    /// platform reset and returns the distinguished fatal error; on real
    /// hardware `trigger_reset` does not return.
    pub fn respond<S: DebugGate + OtpStore + ResetControl>(
        &mut self,
        events: TamperEvents,
        ctx: &TamperContext,
        keys: &mut KeyCache,
        soc: &mut S,
    ) -> VaultbootResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let erase = TamperEvents::VOLTAGE_LOW | TamperEvents::VOLTAGE_HIGH | TamperEvents::GLITCH;
        let lock = TamperEvents::VOLTAGE_LOW
            | TamperEvents::VOLTAGE_HIGH
            | TamperEvents::TEMP_LOW
            | TamperEvents::TEMP_HIGH;

        if events.intersects(erase) {
            keys.erase_all();
        }

        if events.intersects(lock) {
            ctx.set_locked();
            // Already-programmed lock bit is fine; the flag is sticky.
            let _ = soc.write_once(TAMPER_LOCK_SLOT, TAMPER_LOCK_MAGIC);
            soc.lock_debug_port();
        }

        if events.contains(TamperEvents::GLITCH) {
            soc.trigger_reset();
            return Err(VaultbootError::DRIVER_TAMPER_GLITCH_RESET);
        }

        // Non-glitch trips return control; the monitor keeps watching.
        if self.state == MonitorState::Tripped {
            self.state = MonitorState::Armed;
        }
        Ok(())
    }
}

impl Default for TamperMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_fabric::{DerivedKey, KeyType};

    struct TestSensors {
        voltage: u32,
        temp: i32,
    }

    impl Sensors for TestSensors {
        fn read_voltage_mv(&mut self) -> u32 {
            self.voltage
        }

        fn read_temperature_c(&mut self) -> i32 {
            self.temp
        }
    }

    #[derive(Default)]
    struct TestSoc {
        ops: Vec<&'static str>,
        debug_locked: bool,
    }

    impl DebugGate for TestSoc {
        fn debug_locked(&self) -> bool {
            self.debug_locked
        }

        fn lock_debug_port(&mut self) {
            self.debug_locked = true;
            self.ops.push("debug_lock");
        }
    }

    impl OtpStore for TestSoc {
        fn read_word(&self, _slot: usize) -> Option<u32> {
            None
        }

        fn write_once(&mut self, _slot: usize, _value: u32) -> bool {
            self.ops.push("otp_lock");
            true
        }

        fn counter_value(&self, _index: usize) -> u32 {
            0
        }

        fn counter_increment(&mut self, _index: usize) -> bool {
            true
        }
    }

    impl ResetControl for TestSoc {
        fn trigger_reset(&mut self) {
            self.ops.push("reset");
        }
    }

    fn armed_monitor() -> (TamperMonitor, TamperContext) {
        let mut monitor = TamperMonitor::new();
        monitor.start(TamperThresholds::default()).unwrap();
        (monitor, TamperContext::new())
    }

    fn cache_with_key() -> KeyCache {
        let mut keys = KeyCache::new();
        keys.store(DerivedKey::from_raw(KeyType::Encryption, [0x11; 32]));
        keys
    }

    #[test]
    fn test_poll_before_arm_fails() {
        let mut monitor = TamperMonitor::new();
        let ctx = TamperContext::new();
        let mut sensors = TestSensors {
            voltage: 1800,
            temp: 25,
        };
        assert_eq!(
            monitor.poll(&mut sensors, &ctx),
            Err(VaultbootError::DRIVER_TAMPER_NOT_ARMED)
        );
    }

    #[test]
    fn test_bad_thresholds_rejected() {
        let mut monitor = TamperMonitor::new();
        let bad = TamperThresholds {
            voltage_low_mv: 2000,
            voltage_high_mv: 1700,
            ..TamperThresholds::default()
        };
        assert_eq!(
            monitor.start(bad),
            Err(VaultbootError::DRIVER_TAMPER_BAD_THRESHOLDS)
        );
    }

    #[test]
    fn test_nominal_sample_is_clean() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1800,
            temp: 25,
        };
        let events = monitor.poll(&mut sensors, &ctx).unwrap();
        assert!(events.is_empty());
        assert_eq!(monitor.state(), MonitorState::Armed);
        assert_eq!(ctx.last_voltage_mv(), 1800);
        assert_eq!(ctx.last_temperature_c(), 25);
    }

    #[test]
    fn test_voltage_bounds_classification() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1650,
            temp: 25,
        };
        let events = monitor.poll(&mut sensors, &ctx).unwrap();
        assert_eq!(events, TamperEvents::VOLTAGE_LOW);
        assert_eq!(ctx.event_count(), 1);

        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 2100,
            temp: 25,
        };
        let events = monitor.poll(&mut sensors, &ctx).unwrap();
        assert_eq!(events, TamperEvents::VOLTAGE_HIGH);
        assert_eq!(ctx.event_count(), 1);
    }

    #[test]
    fn test_temperature_bounds_classification() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1800,
            temp: -50,
        };
        assert_eq!(
            monitor.poll(&mut sensors, &ctx).unwrap(),
            TamperEvents::TEMP_LOW
        );

        let mut sensors = TestSensors {
            voltage: 1800,
            temp: 95,
        };
        monitor.state = MonitorState::Armed;
        assert_eq!(
            monitor.poll(&mut sensors, &ctx).unwrap(),
            TamperEvents::TEMP_HIGH
        );
    }

    #[test]
    fn test_glitch_delta_regardless_of_level() {
        let (mut monitor, ctx) = armed_monitor();
        // Both samples inside the absolute window, 250 mV apart.
        let mut sensors = TestSensors {
            voltage: 1720,
            temp: 25,
        };
        assert!(monitor.poll(&mut sensors, &ctx).unwrap().is_empty());

        sensors.voltage = 1970;
        let events = monitor.poll(&mut sensors, &ctx).unwrap();
        assert!(events.contains(TamperEvents::GLITCH));
        assert_eq!(monitor.state(), MonitorState::Tripped);
    }

    #[test]
    fn test_delta_at_threshold_is_not_glitch() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1750,
            temp: 25,
        };
        assert!(monitor.poll(&mut sensors, &ctx).unwrap().is_empty());

        sensors.voltage = 1950;
        assert!(monitor.poll(&mut sensors, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_glitch_trip_is_sticky() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1720,
            temp: 25,
        };
        monitor.poll(&mut sensors, &ctx).unwrap();
        sensors.voltage = 1975;
        assert!(monitor
            .poll(&mut sensors, &ctx)
            .unwrap()
            .contains(TamperEvents::GLITCH));

        // Sensor is healthy again; the trip does not clear.
        sensors.voltage = 1800;
        assert_eq!(
            monitor.poll(&mut sensors, &ctx).unwrap(),
            TamperEvents::GLITCH
        );
        assert_eq!(monitor.state(), MonitorState::Tripped);
    }

    #[test]
    fn test_voltage_response_erases_and_locks() {
        let (mut monitor, ctx) = armed_monitor();
        let mut keys = cache_with_key();
        let mut soc = TestSoc::default();

        monitor
            .respond(TamperEvents::VOLTAGE_LOW, &ctx, &mut keys, &mut soc)
            .unwrap();

        assert!(keys.is_empty());
        assert!(ctx.locked());
        assert_eq!(soc.ops, vec!["otp_lock", "debug_lock"]);
        // Non-glitch responses return control and keep watching.
        assert_eq!(monitor.state(), MonitorState::Armed);
    }

    #[test]
    fn test_temperature_response_locks_only() {
        let (mut monitor, ctx) = armed_monitor();
        let mut keys = cache_with_key();
        let mut soc = TestSoc::default();

        monitor
            .respond(TamperEvents::TEMP_HIGH, &ctx, &mut keys, &mut soc)
            .unwrap();

        assert!(!keys.is_empty());
        assert!(ctx.locked());
        assert!(soc.debug_locked);
    }

    #[test]
    fn test_glitch_response_erases_then_resets() {
        let (mut monitor, ctx) = armed_monitor();
        let mut keys = cache_with_key();
        let mut soc = TestSoc::default();

        let result = monitor.respond(TamperEvents::GLITCH, &ctx, &mut keys, &mut soc);
        assert_eq!(result, Err(VaultbootError::DRIVER_TAMPER_GLITCH_RESET));
        assert!(keys.is_empty());
        assert_eq!(soc.ops, vec!["reset"]);
    }

    #[test]
    fn test_pending_mailbox_drains_once() {
        let (mut monitor, ctx) = armed_monitor();
        let mut sensors = TestSensors {
            voltage: 1650,
            temp: 25,
        };
        monitor.poll(&mut sensors, &ctx).unwrap();

        assert_eq!(ctx.take_pending(), TamperEvents::VOLTAGE_LOW);
        assert!(ctx.take_pending().is_empty());
        // Sticky view survives the drain.
        assert_eq!(ctx.sticky_events(), TamperEvents::VOLTAGE_LOW);
    }
}
