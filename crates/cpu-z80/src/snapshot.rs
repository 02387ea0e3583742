//! Save-state support.
//!
//! The memory cache is derived state and is never saved; restoring clears
//! it so lines are requested again from the current mapping.

use emu_core::EmuTime;
use serde::{Deserialize, Serialize};

use crate::config::validate_freq;
use crate::cpu::CpuCore;
use crate::error::SnapshotError;
use crate::interrupt::{InterruptState, Servicing};
use crate::opcodes::Table;
use crate::personality::Personality;
use crate::registers::Registers;

/// Complete architectural and scheduling state of a CPU core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    /// `"z80"` or `"r800"`.
    pub personality: String,
    pub registers: Registers,
    /// Index prefix fetched but not yet followed by an opcode.
    pub prefix: Option<Table>,
    pub after_ei: bool,
    pub nmi_edge: bool,
    pub irq_count: u32,
    pub nmi_count: u32,
    pub servicing: Servicing,
    /// Service state to resume on `RETN` when an NMI is in progress.
    #[serde(default)]
    pub before_nmi: Servicing,
    pub time: EmuTime,
    /// Cycles the clock is past its last whole tick.
    #[serde(default)]
    pub clock_phase: u64,
    /// Cycles executed since construction.
    #[serde(default)]
    pub cycles: u64,
    pub freq_locked: bool,
    pub freq_value: u32,
}

impl CpuSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl<P: Personality> CpuCore<P> {
    /// Capture the current state. Only meaningful between instructions,
    /// which is the only place the loop ever stops.
    #[must_use]
    pub fn save_state(&self) -> CpuSnapshot {
        let irq = &self.link.irq;
        CpuSnapshot {
            personality: P::NAME.to_string(),
            registers: self.regs,
            prefix: self.prefix,
            after_ei: self.after_ei,
            nmi_edge: irq.nmi_edge(),
            irq_count: irq.irq_count(),
            nmi_count: irq.nmi_count(),
            servicing: irq.servicing(),
            before_nmi: irq.before_nmi(),
            time: self.clock.time(),
            clock_phase: self.clock.phase(),
            cycles: self.clock.cycles(),
            freq_locked: self.clock.locked(),
            freq_value: self.clock.value(),
        }
    }

    /// Restore a snapshot taken from the same personality.
    ///
    /// Nothing is modified when the snapshot is rejected.
    pub fn load_state(&mut self, snapshot: &CpuSnapshot) -> Result<(), SnapshotError> {
        if snapshot.personality != P::NAME {
            return Err(SnapshotError::Personality {
                expected: P::NAME,
                found: snapshot.personality.clone(),
            });
        }
        if snapshot.registers.im > 2 {
            return Err(SnapshotError::InterruptMode(snapshot.registers.im));
        }
        let freq = validate_freq(snapshot.freq_value)
            .map_err(|_| SnapshotError::Frequency(snapshot.freq_value))?;

        self.regs = snapshot.registers;
        self.prefix = snapshot.prefix.filter(|t| t.is_index());
        self.after_ei = snapshot.after_ei;
        self.link.irq = InterruptState::restore(
            snapshot.irq_count,
            snapshot.nmi_count,
            snapshot.nmi_edge,
            snapshot.servicing,
            snapshot.before_nmi,
        );
        self.link.exit_sync = false;
        self.link.cache.clear();
        self.link.arm(1);
        self.clock.set_value(freq);
        self.clock.set_locked(snapshot.freq_locked);
        self.clock.restore(snapshot.time, snapshot.clock_phase);
        self.clock.set_cycles(snapshot.cycles);
        tracing::debug!(
            cpu = P::NAME,
            pc = format_args!("{:#06X}", self.regs.pc),
            time = snapshot.time.ticks(),
            "state restored"
        );
        Ok(())
    }
}
