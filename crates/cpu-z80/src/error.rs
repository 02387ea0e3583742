//! Error types.

use thiserror::Error;

/// Rejected CPU configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frequency {0} Hz is outside {min}..={max} Hz", min = crate::config::MIN_FREQ, max = crate::config::MAX_FREQ)]
    Frequency(u32),
    #[error("unknown CPU kind `{0}` (expected `z80` or `r800`)")]
    UnknownKind(String),
    #[error("configuration is for a {expected} but this core is a {actual}")]
    KindMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("time slice must be at least one microsecond")]
    Timeslice,
}

/// Malformed or inapplicable debugger request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DebugError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{command}` expects {expected}")]
    Arguments {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid address `{0}`")]
    Address(String),
    #[error("invalid count `{0}`")]
    Count(String),
    #[error("breakpoint already set at {0:#06X}")]
    BreakpointExists(u16),
    #[error("no breakpoint at {0:#06X}")]
    NoBreakpoint(u16),
    #[error("unknown path `{0}`")]
    UnknownPath(String),
}

/// Snapshot that cannot be restored into this core.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot was taken from a {found}, cannot restore into a {expected}")]
    Personality { expected: &'static str, found: String },
    #[error("invalid interrupt mode {0}")]
    InterruptMode(u8),
    #[error("invalid clock frequency {0} Hz")]
    Frequency(u32),
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
