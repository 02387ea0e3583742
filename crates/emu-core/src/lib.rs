//! Core traits and types for cycle-accurate emulation.
//!
//! All components share one virtual time line. The CPU advances it in
//! cycles of its own (changeable) clock; every other device synchronizes
//! against it through a [`Scheduler`] and is reached through a [`Bus`].

mod bus;
mod clock;
mod cpu;
mod cycles;
mod observable;
mod scheduler;
mod time;

pub use bus::{Access, Bus, CACHE_LINE_SIZE, CACHE_LINES, CpuLink, LineHandle, SimpleBus};
pub use clock::DynamicClock;
pub use cpu::{Cpu, ExitReason};
pub use cycles::Cycles;
pub use observable::{Observable, Value};
pub use scheduler::{Scheduler, SimpleScheduler, SyncTag};
pub use time::{EmuDuration, EmuTime, MAIN_FREQ};
