//! Clock bridge: cycle accounting, frequency control and stop requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_core::{DynamicClock, EmuTime};

/// Time cursor of the CPU plus its frequency settings.
///
/// When unlocked the clock follows the machine default; when locked it
/// follows the explicit value. Either change takes effect for the very next
/// cycle.
#[derive(Debug, Clone)]
pub struct ClockBridge {
    clock: DynamicClock,
    default_freq: u32,
    locked: bool,
    value: u32,
    /// Cycles executed since construction.
    cycles: u64,
}

impl ClockBridge {
    #[must_use]
    pub fn new(time: EmuTime, default_freq: u32) -> Self {
        Self {
            clock: DynamicClock::new(time, default_freq),
            default_freq,
            locked: false,
            value: default_freq,
            cycles: 0,
        }
    }

    #[inline]
    pub fn add(&mut self, cycles: u32) {
        self.clock.add(u64::from(cycles));
        self.cycles += u64::from(cycles);
    }

    /// Advance by `cycles`, which may span a long idle stretch.
    pub fn add_many(&mut self, cycles: u64) {
        self.clock.add(cycles);
        self.cycles = self.cycles.wrapping_add(cycles);
    }

    #[inline]
    #[must_use]
    pub fn time(&self) -> EmuTime {
        self.clock.time()
    }

    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Overwrite the executed-cycle counter (snapshot restore).
    pub fn set_cycles(&mut self, cycles: u64) {
        self.cycles = cycles;
    }

    /// Whole cycles needed to reach `time`.
    #[must_use]
    pub fn cycles_until(&self, time: EmuTime) -> u64 {
        self.clock.cycles_until(time)
    }

    /// Sub-tick position of the cursor, see [`DynamicClock::phase`].
    #[must_use]
    pub const fn phase(&self) -> u64 {
        self.clock.phase()
    }

    /// Put the cursor back where a snapshot left it.
    pub fn restore(&mut self, time: EmuTime, phase: u64) {
        self.clock.restore(time, phase);
    }

    /// Jump to `time` in either direction.
    pub fn warp(&mut self, time: EmuTime) {
        self.clock.reset(time);
    }

    /// Stall until `time` if it lies ahead.
    pub fn wait_until(&mut self, time: EmuTime) {
        self.clock.advance(time);
    }

    /// Frequency currently driving the clock.
    #[must_use]
    pub const fn freq(&self) -> u32 {
        if self.locked { self.value } else { self.default_freq }
    }

    #[must_use]
    pub const fn locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.apply();
    }

    /// Set the explicit frequency. Callers validate it first.
    pub fn set_value(&mut self, value: u32) {
        self.value = value;
        self.apply();
    }

    fn apply(&mut self) {
        let freq = self.freq();
        if freq != self.clock.freq() {
            tracing::info!(freq, locked = self.locked, "CPU frequency changed");
            self.clock.set_freq(freq);
        }
    }
}

/// Cloneable handle for stopping the CPU loop from another thread.
///
/// The request is noticed at the next instruction boundary.
#[derive(Debug, Clone, Default)]
pub struct ExitHandle(Arc<AtomicBool>);

impl ExitHandle {
    /// Ask the loop to stop.
    pub fn exit(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Consume a pending request.
    pub(crate) fn take(&self) -> bool {
        self.is_requested() && self.0.swap(false, Ordering::Relaxed)
    }
}
