//! Z80/R800 CPU core with a cached memory path and sync-point driven loop.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::struct_excessive_bools)] // CPU state requires multiple boolean flags.

mod execute;

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::ops::ControlFlow;

use emu_core::{
    Bus, Cpu, CpuLink, Cycles, EmuDuration, EmuTime, ExitReason, Observable, Scheduler, SyncTag,
    Value,
};

use crate::clock::{ClockBridge, ExitHandle};
use crate::config::{CpuConfig, validate_freq};
use crate::disasm;
use crate::error::ConfigError;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::interrupt::{Interrupt, Servicing};
use crate::link::BusLink;
use crate::opcodes::Table;
use crate::personality::{Personality, R800Type, Z80Type};
use crate::registers::Registers;

/// Instructions between two full boundary checks when nothing needs
/// per-instruction attention.
const RESYNC_INTERVAL: i32 = 1000;

/// A Zilog Z80.
pub type Z80 = CpuCore<Z80Type>;

/// An ASCII R800.
pub type R800 = CpuCore<R800Type>;

/// CPU core shared by both variants.
///
/// The CPU does not own the bus or the scheduler; both are passed to
/// [`execute`](Cpu::execute). Between instructions the loop only compares
/// the clock against the earliest known sync point and polls the
/// asynchronous stop flag. Everything else (interrupt arbitration,
/// synchronous exits, breakpoints, tracing) happens in a boundary check
/// that runs when the slow-instruction countdown expires.
pub struct CpuCore<P: Personality> {
    pub(crate) regs: Registers,
    pub(crate) link: BusLink,
    pub(crate) clock: ClockBridge,
    exit_async: ExitHandle,

    /// Prefix fetched but not yet followed by its opcode (`DD DD ...`).
    pub(crate) prefix: Option<Table>,
    /// The previous instruction was `EI`.
    pub(crate) after_ei: bool,
    /// Fetch from the interrupt acknowledge cycle instead of memory (mode 0).
    fetch_from_ack: bool,

    trace: bool,
    pub(crate) breakpoints: BTreeSet<u16>,
    pub(crate) breaked: bool,
    /// Resume past a breakpoint at the current PC once.
    skip_breakpoint: bool,

    timeslice: EmuDuration,
    _personality: PhantomData<P>,
}

impl<P: Personality> CpuCore<P> {
    /// Create a CPU in its power-on state at `time`.
    #[must_use]
    pub fn new(time: EmuTime) -> Self {
        Self {
            regs: Registers::new(),
            link: BusLink::default(),
            clock: ClockBridge::new(time, P::CLOCK_FREQ),
            exit_async: ExitHandle::default(),
            prefix: None,
            after_ei: false,
            fetch_from_ack: false,
            trace: false,
            breakpoints: BTreeSet::new(),
            breaked: false,
            skip_breakpoint: false,
            timeslice: EmuDuration::from_micros(1000),
            _personality: PhantomData,
        }
    }

    /// Create a CPU and apply `config`.
    pub fn with_config(config: &CpuConfig, time: EmuTime) -> Result<Self, ConfigError> {
        let mut cpu = Self::new(time);
        cpu.apply_config(config)?;
        Ok(cpu)
    }

    /// Variant name (`"z80"` or `"r800"`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        P::NAME
    }

    /// Validate and apply a configuration.
    pub fn apply_config(&mut self, config: &CpuConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.kind != P::KIND {
            return Err(ConfigError::KindMismatch {
                expected: config.kind.name(),
                actual: P::NAME,
            });
        }
        self.clock.set_value(config.freq_value);
        self.clock.set_locked(config.freq_locked);
        self.set_trace(config.trace);
        self.timeslice = EmuDuration::from_micros(config.timeslice);
        Ok(())
    }

    /// Mutable access to the register file.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Run at the explicit frequency (`true`) or the machine default.
    pub fn set_freq_locked(&mut self, locked: bool) {
        self.clock.set_locked(locked);
    }

    /// Set the explicit frequency used while locked.
    pub fn set_freq_value(&mut self, freq: u32) -> Result<(), ConfigError> {
        self.clock.set_value(validate_freq(freq)?);
        Ok(())
    }

    /// Frequency currently driving the clock, in Hz.
    #[must_use]
    pub const fn freq(&self) -> u32 {
        self.clock.freq()
    }

    /// Cycles executed since construction.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.clock.cycles()
    }

    /// Emit one trace event per instruction.
    pub fn set_trace(&mut self, enabled: bool) {
        if self.trace != enabled {
            self.trace = enabled;
            self.link.arm(1);
        }
    }

    #[must_use]
    pub const fn trace_enabled(&self) -> bool {
        self.trace
    }

    /// Move the clock cursor to `time` without executing.
    pub fn set_time(&mut self, time: EmuTime) {
        self.clock.warp(time);
    }

    /// Stall the CPU until `time` (wait states, bus arbitration).
    pub fn wait_until(&mut self, time: EmuTime) {
        self.clock.wait_until(time);
    }

    /// Handle for stopping the loop from another thread.
    #[must_use]
    pub fn exit_handle(&self) -> ExitHandle {
        self.exit_async.clone()
    }

    /// Stop the loop as soon as possible; safe to call from any thread
    /// holding an [`ExitHandle`].
    pub fn exit_cpu_loop_async(&self) {
        self.exit_async.exit();
    }

    /// Lines of the memory cache currently populated.
    #[must_use]
    pub fn cached_lines(&self) -> usize {
        self.link.cache.cached_lines()
    }

    /// Register the CPU's recurring sync point one time slice ahead.
    pub fn schedule_timeslice<S: Scheduler>(&mut self, scheduler: &mut S) {
        let at = self.clock.time().max(scheduler.now()) + self.timeslice;
        scheduler.schedule_sync_point(at, SyncTag::CPU);
        self.link.sync_point_scheduled(at);
    }

    /// Called by the host for every sync point it dispatches.
    ///
    /// Re-registers the CPU's own time slice when `tag` is [`SyncTag::CPU`].
    pub fn sync_point_reached<S: Scheduler>(&mut self, scheduler: &mut S, tag: SyncTag) {
        if tag == SyncTag::CPU {
            self.schedule_timeslice(scheduler);
        }
    }

    /// Disassemble the instruction at `address` without executing it.
    ///
    /// Returns the mnemonic and the instruction length.
    pub fn disassemble<B: Bus>(&self, bus: &B, address: u16) -> (String, u16) {
        disasm::disassemble(bus, address, P::HAS_MULTIPLY)
    }

    #[inline]
    pub(crate) fn charge(&mut self, cycles: u32) {
        self.clock.add(cycles);
    }

    /// Whether the boundary check must run again before the next instruction.
    fn needs_slow(&self) -> bool {
        self.trace
            || !self.breakpoints.is_empty()
            || self.breaked
            || self.link.exit_sync
            || self.link.irq.nmi_edge()
            || (self.link.irq.irq_pending() && self.regs.iff1)
    }

    /// Full instruction-boundary check.
    ///
    /// Breaks with the reason to leave the loop, or continues with whether
    /// an interrupt was accepted.
    fn boundary<B: Bus>(&mut self, bus: &mut B) -> ControlFlow<ExitReason, bool> {
        if self.link.exit_sync {
            self.link.exit_sync = false;
            return ControlFlow::Break(ExitReason::Stopped);
        }
        if self.prefix.is_none() {
            let pc = self.regs.pc;
            let skip = std::mem::take(&mut self.skip_breakpoint);
            if !skip && self.breakpoints.contains(&pc) {
                self.breaked = true;
                tracing::debug!(pc = format_args!("{pc:#06X}"), cpu = P::NAME, "breakpoint hit");
                return ControlFlow::Break(ExitReason::Breakpoint(pc));
            }
        }
        let accepted = self.accept_interrupt(bus);
        if self.trace && !accepted && self.prefix.is_none() && !self.regs.halted {
            self.trace_instruction(bus);
        }
        self.link.slow = if self.needs_slow() { 1 } else { RESYNC_INTERVAL };
        ControlFlow::Continue(accepted)
    }

    fn trace_instruction<B: Bus>(&self, bus: &B) {
        let pc = self.regs.pc;
        let (text, _) = disasm::disassemble(bus, pc, P::HAS_MULTIPLY);
        tracing::trace!(
            pc = format_args!("{pc:04X}"),
            instr = %text,
            af = format_args!("{:04X}", self.regs.af()),
            bc = format_args!("{:04X}", self.regs.bc()),
            de = format_args!("{:04X}", self.regs.de()),
            hl = format_args!("{:04X}", self.regs.hl()),
            ix = format_args!("{:04X}", self.regs.ix),
            iy = format_args!("{:04X}", self.regs.iy),
            sp = format_args!("{:04X}", self.regs.sp),
            "instruction"
        );
    }

    /// Arbitrate and, if something wins, vector into its handler.
    ///
    /// Never runs in the middle of a prefix sequence.
    pub(crate) fn accept_interrupt<B: Bus>(&mut self, bus: &mut B) -> bool {
        if self.prefix.is_some() {
            return false;
        }
        let blocked = std::mem::take(&mut self.after_ei);
        let Some(kind) = self.link.irq.arbitrate(self.regs.iff1, blocked) else {
            return false;
        };
        self.link.irq.accept(kind);
        self.regs.halted = false;
        let t = P::TIMING;
        match kind {
            Interrupt::Nmi => {
                self.regs.inc_r(1);
                self.regs.iff1 = false;
                let pc = self.regs.pc;
                self.push(bus, pc);
                self.regs.pc = 0x0066;
                self.regs.wz = 0x0066;
                self.charge(t.nmi);
                tracing::trace!(ret = format_args!("{pc:#06X}"), "NMI accepted");
            }
            Interrupt::Irq => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                match self.regs.im {
                    0 => {
                        // The acknowledge cycle is the M1 of the supplied
                        // instruction.
                        tracing::trace!(mode = 0, "IRQ accepted");
                        self.charge(t.im0_extra);
                        self.fetch_from_ack = true;
                        self.execute_instruction(bus);
                        self.fetch_from_ack = false;
                    }
                    1 => {
                        self.regs.inc_r(1);
                        let pc = self.regs.pc;
                        self.push(bus, pc);
                        self.regs.pc = 0x0038;
                        self.regs.wz = 0x0038;
                        self.charge(t.im1);
                        tracing::trace!(mode = 1, vector = "0x0038", "IRQ accepted");
                    }
                    _ => {
                        self.regs.inc_r(1);
                        let table = u16::from(self.regs.i) << 8 | u16::from(bus.interrupt_ack());
                        let pc = self.regs.pc;
                        self.push(bus, pc);
                        let target = self.read_word(bus, table);
                        self.regs.pc = target;
                        self.regs.wz = target;
                        self.charge(t.im2);
                        tracing::trace!(
                            mode = 2,
                            table = format_args!("{table:#06X}"),
                            vector = format_args!("{target:#06X}"),
                            "IRQ accepted"
                        );
                    }
                }
            }
        }
        true
    }

    /// Burn M1 cycles while halted, up to the sync point when one is known.
    fn idle_halted(&mut self) {
        let m1 = u64::from(P::TIMING.m1.max(1));
        let count = if self.link.limit == EmuTime::INFINITY {
            1
        } else {
            self.clock.cycles_until(self.link.limit).div_ceil(m1).max(1)
        };
        self.clock.add_many(count * m1);
        self.regs.inc_r((count % 128) as u8);
    }

    /// One instruction, one halted M1, or one interrupt acceptance.
    fn single_step<B: Bus>(&mut self, bus: &mut B) {
        if self.accept_interrupt(bus) {
            return;
        }
        if self.regs.halted {
            self.regs.inc_r(1);
            self.charge(P::TIMING.m1);
        } else {
            self.execute_instruction(bus);
        }
    }

    /// Leave break state; a breakpoint at the current PC is passed once.
    pub fn continue_cpu(&mut self) {
        if self.breaked {
            tracing::debug!(pc = format_args!("{:#06X}", self.regs.pc), "continue");
        }
        self.breaked = false;
        self.skip_breakpoint = true;
        self.link.arm(1);
    }

    /// Enter break state. `execute` returns [`ExitReason::Breaked`] until
    /// [`continue_cpu`](Self::continue_cpu).
    pub fn break_cpu(&mut self) {
        if !self.breaked {
            tracing::debug!(pc = format_args!("{:#06X}", self.regs.pc), "break");
        }
        self.breaked = true;
        self.link.arm(1);
    }

    #[must_use]
    pub const fn is_breaked(&self) -> bool {
        self.breaked
    }

    /// Execute one instruction while in break state.
    pub fn debug_step<B: Bus>(&mut self, bus: &mut B) -> Cycles {
        tracing::debug!(pc = format_args!("{:#06X}", self.regs.pc), "step");
        self.breaked = true;
        self.step(bus)
    }

    /// Current interrupt-service state.
    #[must_use]
    pub const fn servicing(&self) -> Servicing {
        self.link.irq.servicing()
    }

    #[must_use]
    pub const fn irq_count(&self) -> u32 {
        self.link.irq.irq_count()
    }

    #[must_use]
    pub const fn nmi_count(&self) -> u32 {
        self.link.irq.nmi_count()
    }
}

impl<P: Personality> CpuLink for CpuCore<P> {
    fn raise_irq(&mut self) {
        self.link.raise_irq();
    }

    fn lower_irq(&mut self) {
        self.link.lower_irq();
    }

    fn raise_nmi(&mut self) {
        self.link.raise_nmi();
    }

    fn lower_nmi(&mut self) {
        self.link.lower_nmi();
    }

    fn invalidate_mem_cache(&mut self, start: u16, size: u32) {
        self.link.invalidate(start, size);
    }

    fn exit_cpu_loop_sync(&mut self) {
        self.link.exit_cpu_loop_sync();
    }

    fn sync_point_scheduled(&mut self, time: EmuTime) {
        self.link.sync_point_scheduled(time);
    }
}

impl<P: Personality> Cpu for CpuCore<P> {
    type Registers = Registers;

    fn execute<B: Bus, S: Scheduler>(&mut self, bus: &mut B, scheduler: &mut S) -> ExitReason {
        if self.breaked {
            return ExitReason::Breaked;
        }
        self.clock.wait_until(scheduler.now());
        self.link.limit = scheduler.next_sync_point();
        self.link.slow = 0;
        loop {
            if self.exit_async.take() {
                return ExitReason::Interrupted;
            }
            if self.clock.time() >= self.link.limit {
                return ExitReason::SyncPoint(self.link.limit);
            }
            self.link.slow -= 1;
            if self.link.slow <= 0 {
                self.link.limit = self.link.limit.min(scheduler.next_sync_point());
                match self.boundary(bus) {
                    ControlFlow::Break(reason) => return reason,
                    // Re-check time before running the handler.
                    ControlFlow::Continue(true) => continue,
                    ControlFlow::Continue(false) => {}
                }
            }
            if self.regs.halted {
                self.idle_halted();
            } else {
                self.execute_instruction(bus);
            }
        }
    }

    fn step<B: Bus>(&mut self, bus: &mut B) -> Cycles {
        let before = self.clock.cycles();
        self.single_step(bus);
        Cycles::new(self.clock.cycles() - before)
    }

    fn time(&self) -> EmuTime {
        self.clock.time()
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.regs.halted
    }

    fn reset(&mut self, time: EmuTime) {
        tracing::debug!(cpu = P::NAME, "reset");
        self.regs = Registers::new();
        self.prefix = None;
        self.after_ei = false;
        self.fetch_from_ack = false;
        self.link.irq.reset();
        self.link.exit_sync = false;
        self.link.cache.clear();
        self.link.arm(0);
        self.clock.warp(time);
    }
}

/// All query paths supported by the core.
const QUERY_PATHS: &[&str] = &[
    // Main registers
    "a", "f", "b", "c", "d", "e", "h", "l",
    // Register pairs
    "af", "bc", "de", "hl",
    // Alternate pairs
    "af'", "bc'", "de'", "hl'",
    // Index registers
    "ix", "iy", "ixh", "ixl", "iyh", "iyl",
    // Other registers
    "sp", "pc", "i", "r", "wz",
    // Flags
    "flags.s", "flags.z", "flags.y", "flags.h",
    "flags.x", "flags.p", "flags.n", "flags.c",
    // Interrupt state
    "iff1", "iff2", "im", "irq.count", "nmi.count", "nmi.edge", "irq.servicing",
    // CPU state
    "halted", "breaked", "cpu", "cycles",
    // Clock
    "clock.freq", "clock.locked", "clock.value", "clock.time",
];

impl<P: Personality> Observable for CpuCore<P> {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        match path {
            "a" => Some(r.a.into()),
            "f" => Some(r.f.into()),
            "b" => Some(r.b.into()),
            "c" => Some(r.c.into()),
            "d" => Some(r.d.into()),
            "e" => Some(r.e.into()),
            "h" => Some(r.h.into()),
            "l" => Some(r.l.into()),

            "af" => Some(r.af().into()),
            "bc" => Some(r.bc().into()),
            "de" => Some(r.de().into()),
            "hl" => Some(r.hl().into()),

            "af'" => Some(r.af_alt().into()),
            "bc'" => Some(r.bc_alt().into()),
            "de'" => Some(r.de_alt().into()),
            "hl'" => Some(r.hl_alt().into()),

            "ix" => Some(r.ix.into()),
            "iy" => Some(r.iy.into()),
            "ixh" => Some(((r.ix >> 8) as u8).into()),
            "ixl" => Some((r.ix as u8).into()),
            "iyh" => Some(((r.iy >> 8) as u8).into()),
            "iyl" => Some((r.iy as u8).into()),

            "sp" => Some(r.sp.into()),
            "pc" => Some(r.pc.into()),
            "i" => Some(r.i.into()),
            "r" => Some(r.r.into()),
            "wz" => Some(r.wz.into()),

            "flags.s" => Some((r.f & SF != 0).into()),
            "flags.z" => Some((r.f & ZF != 0).into()),
            "flags.y" => Some((r.f & YF != 0).into()),
            "flags.h" => Some((r.f & HF != 0).into()),
            "flags.x" => Some((r.f & XF != 0).into()),
            "flags.p" => Some((r.f & PF != 0).into()),
            "flags.n" => Some((r.f & NF != 0).into()),
            "flags.c" => Some((r.f & CF != 0).into()),

            "iff1" => Some(r.iff1.into()),
            "iff2" => Some(r.iff2.into()),
            "im" => Some(r.im.into()),
            "irq.count" => Some(self.link.irq.irq_count().into()),
            "nmi.count" => Some(self.link.irq.nmi_count().into()),
            "nmi.edge" => Some(self.link.irq.nmi_edge().into()),
            "irq.servicing" => Some(
                match self.link.irq.servicing() {
                    Servicing::Idle => "idle",
                    Servicing::Nmi => "nmi",
                    Servicing::Irq => "irq",
                }
                .into(),
            ),

            "halted" => Some(r.halted.into()),
            "breaked" => Some(self.breaked.into()),
            "cpu" => Some(P::NAME.into()),
            "cycles" => Some(self.clock.cycles().into()),

            "clock.freq" => Some(self.clock.freq().into()),
            "clock.locked" => Some(self.clock.locked().into()),
            "clock.value" => Some(self.clock.value().into()),
            "clock.time" => Some(self.clock.time().ticks().into()),

            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use emu_core::SimpleBus;

    use super::*;

    #[test]
    fn every_query_path_resolves() {
        let cpu = Z80::new(EmuTime::ZERO);
        for path in cpu.query_paths() {
            assert!(cpu.query(path).is_some(), "{path}");
        }
        assert_eq!(cpu.query("cpu"), Some(Value::from("z80")));
        assert_eq!(cpu.query("nope"), None);
    }

    #[test]
    fn power_on_state() {
        let cpu = R800::new(EmuTime::ZERO);
        let regs = cpu.registers();
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, 0xFFFF);
        assert_eq!(regs.af(), 0xFFFF);
        assert!(!regs.iff1);
        assert_eq!(cpu.freq(), 7_159_090);
    }

    #[test]
    fn reset_clears_cache_and_prefix() {
        let mut bus = SimpleBus::new();
        bus.load(0, &[0xDD, 0xDD, 0x00]);
        let mut cpu = Z80::new(EmuTime::ZERO);
        cpu.step(&mut bus);
        assert!(cpu.prefix.is_some());
        assert!(cpu.cached_lines() > 0);
        cpu.reset(EmuTime::from_ticks(1234));
        assert!(cpu.prefix.is_none());
        assert_eq!(cpu.cached_lines(), 0);
        assert_eq!(cpu.time(), EmuTime::from_ticks(1234));
    }

    #[test]
    fn config_kind_must_match_core() {
        let config = CpuConfig::default();
        assert!(R800::with_config(&config, EmuTime::ZERO).is_err());
        assert!(Z80::with_config(&config, EmuTime::ZERO).is_ok());
    }

    #[test]
    fn locked_frequency_applies_immediately() {
        let mut cpu = Z80::new(EmuTime::ZERO);
        cpu.set_freq_value(7_159_090).unwrap();
        cpu.set_freq_locked(true);
        assert_eq!(cpu.freq(), 7_159_090);
        assert!(cpu.set_freq_value(10).is_err());
        assert_eq!(cpu.freq(), 7_159_090);
    }
}
