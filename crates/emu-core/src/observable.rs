//! Read-only state inspection by dotted path.
//!
//! Debuggers and tests name a piece of component state (`pc`, `flags.z`,
//! `irq.count`) and get back a [`Value`]. Asking never changes anything.

use std::fmt;

/// One inspected piece of state.
///
/// Integers keep their width so that they print the way a debugger shows
/// registers: `#XX` for bytes, `#XXXX` for words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Flag(bool),
    Byte(u8),
    Word(u16),
    /// Counters, frequencies and timestamps, printed in decimal.
    Count(u64),
    Text(String),
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Flag,
    u8 => Byte,
    u16 => Word,
    u64 => Count,
    String => Text,
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Count(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl Value {
    /// The value as an unsigned integer, if it is one.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Flag(b) => Some(u64::from(b)),
            Value::Byte(v) => Some(u64::from(v)),
            Value::Word(v) => Some(u64::from(v)),
            Value::Count(v) => Some(v),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Flag(b) => f.write_str(if *b { "1" } else { "0" }),
            Value::Byte(v) => write!(f, "#{v:02X}"),
            Value::Word(v) => write!(f, "#{v:04X}"),
            Value::Count(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// A component whose state can be inspected between instructions.
pub trait Observable {
    /// Look up one path, e.g. `hl`, `flags.c` or `clock.freq`.
    ///
    /// `None` for paths the component does not know.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path `query` answers.
    fn query_paths(&self) -> &'static [&'static str];

    /// Snapshot of every known path, in `query_paths` order.
    fn dump(&self) -> Vec<(&'static str, Value)> {
        self.query_paths()
            .iter()
            .filter_map(|&path| self.query(path).map(|v| (path, v)))
            .collect()
    }
}
