//! Cycle clock with a changeable frequency.

use crate::time::{EmuDuration, EmuTime, MAIN_FREQ};

/// Time cursor that advances in whole cycles of a clock whose frequency may
/// change at any moment.
///
/// Time is derived from the cycle count since `base`,
/// `base + count * MAIN_FREQ / freq`, so frequencies that do not divide
/// [`MAIN_FREQ`] never accumulate rounding error. Every `freq` cycles are
/// exactly `MAIN_FREQ` ticks and get folded into `base`, which keeps
/// `count` (the phase) below `freq`. Changing the frequency only
/// affects cycles added afterwards; time already elapsed is never rescaled.
#[derive(Debug, Clone, Copy)]
pub struct DynamicClock {
    base: EmuTime,
    count: u64,
    now: EmuTime,
    freq: u32,
}

impl DynamicClock {
    /// Create a clock at `time` running at `freq` Hz.
    #[must_use]
    pub fn new(time: EmuTime, freq: u32) -> Self {
        debug_assert!(freq > 0, "clock frequency must be positive");
        Self {
            base: time,
            count: 0,
            now: time,
            freq: freq.max(1),
        }
    }

    /// Current position of the cursor.
    #[must_use]
    pub const fn time(&self) -> EmuTime {
        self.now
    }

    /// Frequency in Hz.
    #[must_use]
    pub const fn freq(&self) -> u32 {
        self.freq
    }

    /// Ticks covered by the first `count` cycles after `base`, rounded down.
    fn ticks_for(&self, count: u64) -> u64 {
        let ticks = u128::from(count) * u128::from(MAIN_FREQ) / u128::from(self.freq);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Change the frequency. Takes effect for the next cycle added.
    pub fn set_freq(&mut self, freq: u32) {
        debug_assert!(freq > 0, "clock frequency must be positive");
        self.rebase(self.now);
        self.freq = freq.max(1);
    }

    /// Advance by `cycles` cycles.
    pub fn add(&mut self, cycles: u64) {
        let freq = u64::from(self.freq);
        self.count = self.count.saturating_add(cycles);
        if self.count >= freq {
            let seconds = self.count / freq;
            self.base += EmuDuration::from_ticks(seconds.saturating_mul(MAIN_FREQ));
            self.count -= seconds * freq;
        }
        self.now = self.base + EmuDuration::from_ticks(self.ticks_for(self.count));
    }

    /// Move the cursor to `time`, backwards or forwards.
    pub fn reset(&mut self, time: EmuTime) {
        self.rebase(time);
    }

    /// Move the cursor forward to `time` if it is later than now.
    pub fn advance(&mut self, time: EmuTime) {
        if time > self.now {
            self.rebase(time);
        }
    }

    /// Cycles since the last whole-tick alignment, always below `freq`.
    #[must_use]
    pub const fn phase(&self) -> u64 {
        self.count
    }

    /// Place the cursor at `time` with a previously saved [`phase`](Self::phase)
    /// at the current frequency.
    pub fn restore(&mut self, time: EmuTime, phase: u64) {
        let phase = phase % u64::from(self.freq);
        let behind = self.ticks_for(phase);
        self.base = EmuTime::from_ticks(time.ticks().saturating_sub(behind));
        self.count = phase;
        self.now = time;
    }

    fn rebase(&mut self, time: EmuTime) {
        self.base = time;
        self.count = 0;
        self.now = time;
    }

    /// Whole cycles needed to reach or pass `time`.
    #[must_use]
    pub fn cycles_until(&self, time: EmuTime) -> u64 {
        if time <= self.now {
            return 0;
        }
        // Smallest total k with floor(k * MAIN_FREQ / freq) >= time - base.
        let target = u128::from(time.saturating_since(self.base).ticks());
        let total = (target * u128::from(self.freq)).div_ceil(u128::from(MAIN_FREQ));
        u64::try_from(total)
            .unwrap_or(u64::MAX)
            .saturating_sub(self.count)
    }

    /// Duration of the next `cycles` cycles at the current frequency.
    #[must_use]
    pub fn duration(&self, cycles: u64) -> EmuDuration {
        let end = self.ticks_for(self.count.saturating_add(cycles));
        EmuDuration::from_ticks(end - self.ticks_for(self.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z80_cycle_is_960_ticks() {
        let mut clock = DynamicClock::new(EmuTime::ZERO, 3_579_545);
        clock.add(4);
        assert_eq!(clock.time().ticks(), 4 * 960);
    }

    #[test]
    fn frequency_change_does_not_rescale_the_past() {
        let mut clock = DynamicClock::new(EmuTime::ZERO, 3_579_545);
        clock.add(10);
        clock.set_freq(7_159_090);
        clock.add(10);
        assert_eq!(clock.time().ticks(), 10 * 960 + 10 * 480);
    }

    #[test]
    fn cycles_until_rounds_up() {
        let clock = DynamicClock::new(EmuTime::ZERO, 3_579_545);
        assert_eq!(clock.cycles_until(EmuTime::from_ticks(961)), 2);
        assert_eq!(clock.cycles_until(EmuTime::from_ticks(960)), 1);
        assert_eq!(clock.cycles_until(EmuTime::ZERO), 0);
    }

    #[test]
    fn odd_frequencies_do_not_drift() {
        // 1 GHz is 3.436 ticks per cycle; truncating the step would lose 13%.
        let mut clock = DynamicClock::new(EmuTime::ZERO, 1_000_000_000);
        for _ in 0..250_000 {
            clock.add(4);
        }
        assert_eq!(clock.time().ticks(), MAIN_FREQ * 1_000_000 / 1_000_000_000);
        assert_eq!(clock.time().ticks(), 3_436_363);
    }

    #[test]
    fn restored_phase_continues_identically() {
        let mut clock = DynamicClock::new(EmuTime::ZERO, 1_000_000_000);
        clock.add(7);
        let mut copy = DynamicClock::new(EmuTime::from_ticks(5), 1_000_000_000);
        copy.restore(clock.time(), clock.phase());
        for _ in 0..100 {
            clock.add(3);
            copy.add(3);
            assert_eq!(copy.time(), clock.time());
        }
    }

    #[test]
    fn cycles_until_matches_fractional_steps() {
        let mut clock = DynamicClock::new(EmuTime::ZERO, 1_000_000_000);
        clock.add(3);
        let target = EmuTime::from_ticks(35);
        let n = clock.cycles_until(target);
        let mut reached = clock;
        reached.add(n);
        assert!(reached.time() >= target);
        let mut short = clock;
        short.add(n - 1);
        assert!(short.time() < target);
        assert_eq!(clock.duration(n), reached.time().saturating_since(clock.time()));
    }

    #[test]
    fn advance_never_moves_backwards() {
        let mut clock = DynamicClock::new(EmuTime::from_ticks(100), 3_579_545);
        clock.advance(EmuTime::from_ticks(50));
        assert_eq!(clock.time().ticks(), 100);
        clock.advance(EmuTime::from_ticks(500));
        assert_eq!(clock.time().ticks(), 500);
    }
}
