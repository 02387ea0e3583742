//! Interrupt and NMI line state.

use serde::{Deserialize, Serialize};

/// Which kind of interrupt the CPU is currently servicing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Servicing {
    #[default]
    Idle,
    Nmi,
    Irq,
}

/// Interrupt chosen at an instruction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
}

/// Assertion counters for both interrupt lines.
///
/// Several devices may hold a line at once; each `raise` must be paired with
/// exactly one later `lower`. The NMI line is edge-triggered: only a
/// transition from released to asserted latches a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptState {
    irq: u32,
    nmi: u32,
    nmi_edge: bool,
    servicing: Servicing,
    /// What an accepted NMI interrupted; `RETN` returns to it.
    before_nmi: Servicing,
}

impl InterruptState {
    pub fn raise_irq(&mut self) {
        self.irq += 1;
    }

    pub fn lower_irq(&mut self) {
        debug_assert!(self.irq > 0, "lower_irq without matching raise_irq");
        self.irq = self.irq.saturating_sub(1);
    }

    pub fn raise_nmi(&mut self) {
        if self.nmi == 0 {
            self.nmi_edge = true;
        }
        self.nmi += 1;
    }

    pub fn lower_nmi(&mut self) {
        debug_assert!(self.nmi > 0, "lower_nmi without matching raise_nmi");
        self.nmi = self.nmi.saturating_sub(1);
    }

    #[must_use]
    pub const fn irq_count(&self) -> u32 {
        self.irq
    }

    #[must_use]
    pub const fn nmi_count(&self) -> u32 {
        self.nmi
    }

    /// True while any device holds the maskable line.
    #[must_use]
    pub const fn irq_pending(&self) -> bool {
        self.irq > 0
    }

    /// True between a rising NMI edge and its acceptance.
    #[must_use]
    pub const fn nmi_edge(&self) -> bool {
        self.nmi_edge
    }

    #[must_use]
    pub const fn servicing(&self) -> Servicing {
        self.servicing
    }

    /// Service state an in-progress NMI handler returns to.
    #[must_use]
    pub const fn before_nmi(&self) -> Servicing {
        self.before_nmi
    }

    /// Decide what to accept at this boundary.
    ///
    /// NMI always wins and ignores IFF1. `irq_blocked` covers the boundary
    /// directly after `EI`.
    #[must_use]
    pub const fn arbitrate(&self, iff1: bool, irq_blocked: bool) -> Option<Interrupt> {
        if self.nmi_edge {
            Some(Interrupt::Nmi)
        } else if self.irq > 0 && iff1 && !irq_blocked {
            Some(Interrupt::Irq)
        } else {
            None
        }
    }

    /// Record acceptance of `kind`.
    pub fn accept(&mut self, kind: Interrupt) {
        match kind {
            Interrupt::Nmi => {
                self.nmi_edge = false;
                if self.servicing != Servicing::Nmi {
                    self.before_nmi = self.servicing;
                }
                self.servicing = Servicing::Nmi;
            }
            Interrupt::Irq => self.servicing = Servicing::Irq,
        }
    }

    /// `RETN`: leave NMI service and resume whatever it interrupted.
    pub fn finish_nmi(&mut self) {
        self.servicing = match self.servicing {
            Servicing::Nmi => self.before_nmi,
            _ => Servicing::Idle,
        };
        self.before_nmi = Servicing::Idle;
    }

    /// `RETI`: the maskable handler is done.
    pub fn finish_irq(&mut self) {
        self.servicing = Servicing::Idle;
        self.before_nmi = Servicing::Idle;
    }

    /// CPU reset: drop the latched edge and any service in progress.
    ///
    /// Line counts survive since devices still hold their lines.
    pub fn reset(&mut self) {
        self.nmi_edge = false;
        self.servicing = Servicing::Idle;
        self.before_nmi = Servicing::Idle;
    }

    /// Rebuild from persisted values.
    #[must_use]
    pub const fn restore(
        irq: u32,
        nmi: u32,
        nmi_edge: bool,
        servicing: Servicing,
        before_nmi: Servicing,
    ) -> Self {
        Self {
            irq,
            nmi,
            nmi_edge,
            servicing,
            before_nmi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_raises_need_matching_lowers() {
        let mut state = InterruptState::default();
        state.raise_irq();
        state.raise_irq();
        state.lower_irq();
        assert!(state.irq_pending());
        state.lower_irq();
        assert!(!state.irq_pending());
        assert_eq!(state.irq_count(), 0);
    }

    #[test]
    fn lower_restores_previous_count() {
        let mut state = InterruptState::default();
        state.raise_nmi();
        let before = state.nmi_count();
        state.raise_nmi();
        state.lower_nmi();
        assert_eq!(state.nmi_count(), before);
    }

    #[test]
    fn nmi_is_edge_triggered() {
        let mut state = InterruptState::default();
        state.raise_nmi();
        state.raise_nmi();
        assert_eq!(state.arbitrate(false, false), Some(Interrupt::Nmi));
        state.accept(Interrupt::Nmi);
        assert_eq!(state.arbitrate(false, false), None);

        // Fully releasing the line re-arms the edge detector.
        state.lower_nmi();
        state.lower_nmi();
        state.raise_nmi();
        assert!(state.nmi_edge());
    }

    #[test]
    fn irq_respects_iff1_and_ei_delay() {
        let mut state = InterruptState::default();
        state.raise_irq();
        assert_eq!(state.arbitrate(false, false), None);
        assert_eq!(state.arbitrate(true, true), None);
        assert_eq!(state.arbitrate(true, false), Some(Interrupt::Irq));
    }

    #[test]
    fn retn_resumes_interrupted_irq_service() {
        let mut state = InterruptState::default();
        state.raise_irq();
        state.accept(Interrupt::Irq);
        state.raise_nmi();
        state.accept(Interrupt::Nmi);
        assert_eq!(state.servicing(), Servicing::Nmi);
        state.finish_nmi();
        assert_eq!(state.servicing(), Servicing::Irq);
        state.finish_irq();
        assert_eq!(state.servicing(), Servicing::Idle);
    }

    #[test]
    fn reset_keeps_line_counts_only() {
        let mut state = InterruptState::default();
        state.raise_irq();
        state.raise_nmi();
        state.accept(Interrupt::Irq);
        state.reset();
        assert!(!state.nmi_edge());
        assert_eq!(state.servicing(), Servicing::Idle);
        assert_eq!(state.irq_count(), 1);
        assert_eq!(state.nmi_count(), 1);
    }

    #[test]
    fn nmi_wins_over_irq() {
        let mut state = InterruptState::default();
        state.raise_irq();
        state.raise_nmi();
        assert_eq!(state.arbitrate(true, false), Some(Interrupt::Nmi));
    }
}
