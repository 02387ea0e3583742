//! CPU core trait.

use crate::bus::{Bus, CpuLink};
use crate::cycles::Cycles;
use crate::scheduler::Scheduler;
use crate::time::EmuTime;

/// Why [`Cpu::execute`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The CPU reached the earliest pending sync point. The host should
    /// dispatch every sync point due at the given time and call
    /// `execute` again.
    SyncPoint(EmuTime),
    /// A device or the host asked the loop to stop at an instruction
    /// boundary.
    Stopped,
    /// Another thread asked the loop to stop.
    Interrupted,
    /// Execution reached a breakpoint at this address.
    Breakpoint(u16),
    /// The debugger holds the CPU in break state.
    Breaked,
}

/// A CPU core.
///
/// CPUs execute instructions and access memory through a bus. The bus is
/// passed in, not owned, so it can be shared with other components. On
/// every slow-path access the CPU hands itself to the bus as a
/// [`CpuLink`], so devices can raise interrupts or invalidate cached
/// memory synchronously.
pub trait Cpu: CpuLink {
    /// The type used for register inspection.
    type Registers;

    /// Run instructions until a sync point, exit request, or breakpoint.
    fn execute<B: Bus, S: Scheduler>(&mut self, bus: &mut B, scheduler: &mut S) -> ExitReason;

    /// Execute exactly one instruction (or interrupt acceptance) and return
    /// the cycles it took.
    fn step<B: Bus>(&mut self, bus: &mut B) -> Cycles;

    /// Current position of the CPU on the shared time line.
    fn time(&self) -> EmuTime;

    /// Program counter, zero-extended.
    fn pc(&self) -> u32;

    /// Copy of the register file.
    fn registers(&self) -> Self::Registers;

    /// Whether the CPU sits in HALT waiting for an interrupt.
    fn is_halted(&self) -> bool;

    /// Reset the CPU to its power-on state at `time`.
    fn reset(&mut self, time: EmuTime);
}
