//! Cycle-accurate Z80 and R800 CPU core.
//!
//! One instruction engine serves both variants; a [`Personality`] supplies
//! the cycle costs and variant quirks. The core reads memory through a
//! per-256-byte-line cache of handles into the bus arena, falls back to the
//! bus slow path on refusal, and only stops between instructions: at the
//! next scheduler sync point, on a synchronous or asynchronous exit
//! request, or at a breakpoint.

mod alu;
mod cache;
mod clock;
mod config;
mod cpu;
mod debug;
mod disasm;
mod error;
mod flags;
mod interrupt;
mod link;
mod opcodes;
mod personality;
mod registers;
mod snapshot;

pub use clock::ExitHandle;
pub use config::{CpuConfig, CpuKind, MAX_FREQ, MIN_FREQ};
pub use cpu::{CpuCore, R800, Z80};
pub use debug::parse_address;
pub use disasm::disassemble;
pub use error::{ConfigError, DebugError, SnapshotError};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use interrupt::Servicing;
pub use opcodes::{AluOp, BlockOp, Cond, Mem, Op, R8, R16, RotOp, Table};
pub use personality::{Personality, R800_TIMING, R800Type, Timing, Z80_TIMING, Z80Type};
pub use registers::Registers;
pub use snapshot::CpuSnapshot;
