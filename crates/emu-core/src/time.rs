//! Absolute virtual time.

use serde::{Deserialize, Serialize};

/// Resolution of virtual time, in ticks per second.
///
/// A multiple of both common MSX CPU clocks (3.58 MHz and 7.16 MHz), so one
/// cycle of either is a whole number of ticks.
pub const MAIN_FREQ: u64 = 3_579_545 * 960;

/// A point on the shared virtual time line, in [`MAIN_FREQ`] ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EmuTime(u64);

impl EmuTime {
    pub const ZERO: Self = Self(0);

    /// A time that is never reached.
    pub const INFINITY: Self = Self(u64::MAX);

    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Duration elapsed since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> EmuDuration {
        EmuDuration(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add<EmuDuration> for EmuTime {
    type Output = Self;

    fn add(self, rhs: EmuDuration) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl core::ops::AddAssign<EmuDuration> for EmuTime {
    fn add_assign(&mut self, rhs: EmuDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

/// A span of virtual time, in [`MAIN_FREQ`] ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EmuDuration(u64);

impl EmuDuration {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(MAIN_FREQ) / 1_000_000)
    }

    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }
}
