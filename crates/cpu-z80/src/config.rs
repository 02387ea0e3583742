//! CPU configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lowest accepted explicit frequency.
pub const MIN_FREQ: u32 = 1_000_000;

/// Highest accepted explicit frequency.
pub const MAX_FREQ: u32 = 1_000_000_000;

/// Which CPU variant to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuKind {
    #[default]
    Z80,
    R800,
}

impl CpuKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Z80 => "z80",
            Self::R800 => "r800",
        }
    }
}

impl fmt::Display for CpuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "z80" => Ok(Self::Z80),
            "r800" => Ok(Self::R800),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Settings a host may change on a running CPU.
///
/// `freq_value` is only used while `freq_locked` is set; otherwise the
/// core runs at its machine-default clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub kind: CpuKind,
    pub freq_locked: bool,
    pub freq_value: u32,
    /// Emit one `tracing` event per executed instruction.
    pub trace: bool,
    /// Interval of the CPU's own recurring sync point, in microseconds.
    pub timeslice: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            kind: CpuKind::Z80,
            freq_locked: false,
            freq_value: 3_579_545,
            trace: false,
            timeslice: 1000,
        }
    }
}

impl CpuConfig {
    /// Check every value before it reaches the core.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_freq(self.freq_value)?;
        if self.timeslice == 0 {
            return Err(ConfigError::Timeslice);
        }
        Ok(())
    }
}

/// Accept only frequencies within [`MIN_FREQ`]..=[`MAX_FREQ`].
pub fn validate_freq(freq: u32) -> Result<u32, ConfigError> {
    if (MIN_FREQ..=MAX_FREQ).contains(&freq) {
        Ok(freq)
    } else {
        Err(ConfigError::Frequency(freq))
    }
}
