//! Interrupt arbitration, vectoring and return.

use cpu_z80::{Servicing, Z80};
use emu_core::{
    Bus, Cpu, CpuLink, EmuTime, ExitReason, Scheduler, SimpleBus, SimpleScheduler, SyncTag,
};

/// IM 1 ; EI ; NOP ; NOP ...
fn im1_program() -> SimpleBus {
    let mut bus = SimpleBus::new();
    bus.load(0, &[0xED, 0x56, 0xFB, 0x00, 0x00, 0x00]);
    bus
}

#[test]
fn mode1_vectors_to_0038() {
    let mut bus = im1_program();
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    cpu.raise_irq();

    // The instruction after EI always runs first.
    assert_eq!(cpu.step(&mut bus).get(), 4);
    assert_eq!(cpu.registers().pc, 4);

    assert_eq!(cpu.step(&mut bus).get(), 13);
    let regs = cpu.registers();
    assert_eq!(regs.pc, 0x0038);
    assert!(!regs.iff1);
    assert!(!regs.iff2);
    assert_eq!(bus.peek(0xFFFD), 0x04);
    assert_eq!(bus.peek(0xFFFE), 0x00);
    assert_eq!(cpu.servicing(), Servicing::Irq);
}

#[test]
fn masked_irq_is_never_taken() {
    let mut bus = SimpleBus::new();
    // DI ; then NOPs
    bus.poke(0, 0xF3);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.raise_irq();
    cpu.raise_irq();
    for _ in 0..50 {
        cpu.step(&mut bus);
        assert_ne!(cpu.registers().pc, 0x0038);
    }
    assert_eq!(cpu.registers().pc, 50);
    assert_eq!(cpu.irq_count(), 2);
}

#[test]
fn irq_counter_pairs_raise_and_lower() {
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.raise_irq();
    cpu.raise_irq();
    cpu.lower_irq();
    assert_eq!(cpu.irq_count(), 1);
    cpu.lower_irq();
    assert_eq!(cpu.irq_count(), 0);
}

#[test]
fn nmi_is_edge_triggered() {
    let mut bus = SimpleBus::new();
    let mut cpu = Z80::new(EmuTime::ZERO);

    // Two devices assert the line one after the other.
    cpu.raise_nmi();
    cpu.raise_nmi();
    assert_eq!(cpu.nmi_count(), 2);

    assert_eq!(cpu.step(&mut bus).get(), 11);
    assert_eq!(cpu.registers().pc, 0x0066);
    assert_eq!(cpu.servicing(), Servicing::Nmi);

    // Line still asserted: no second NMI.
    for _ in 0..10 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().pc, 0x0066 + 10);

    cpu.lower_nmi();
    cpu.raise_nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 0x0066 + 11);

    cpu.lower_nmi();
    cpu.lower_nmi();
    cpu.raise_nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 0x0066);
}

#[test]
fn nmi_ignores_iff1_and_retn_restores_it() {
    let mut bus = SimpleBus::new();
    // EI ; NOP ; at #66: RETN
    bus.load(0, &[0xFB, 0x00, 0x00]);
    bus.load(0x66, &[0xED, 0x45]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.raise_nmi();
    cpu.step(&mut bus);
    let regs = cpu.registers();
    assert_eq!(regs.pc, 0x0066);
    assert!(!regs.iff1);
    assert!(regs.iff2);

    assert_eq!(cpu.step(&mut bus).get(), 14);
    let regs = cpu.registers();
    assert_eq!(regs.pc, 1);
    assert!(regs.iff1);
    assert_eq!(cpu.servicing(), Servicing::Idle);
}

#[test]
fn reset_drops_latched_nmi_and_service_state() {
    let mut bus = SimpleBus::new();
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.raise_nmi();
    assert_eq!(cpu.step(&mut bus).get(), 11);
    assert_eq!(cpu.servicing(), Servicing::Nmi);

    // Re-latch the edge, then reset while the line is still held.
    cpu.lower_nmi();
    cpu.raise_nmi();
    cpu.reset(EmuTime::ZERO);
    assert_eq!(cpu.servicing(), Servicing::Idle);
    assert_eq!(cpu.nmi_count(), 1);

    assert_eq!(cpu.step(&mut bus).get(), 4);
    assert_eq!(cpu.registers().pc, 1);
}

#[test]
fn retn_from_nested_nmi_resumes_irq_service() {
    let mut bus = SimpleBus::new();
    // IM 1 ; EI ; NOP ; handler at #38: NOP ; at #66: RETN
    bus.load(0, &[0xED, 0x56, 0xFB, 0x00]);
    bus.load(0x66, &[0xED, 0x45]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    cpu.raise_irq();
    cpu.step(&mut bus);
    assert_eq!(cpu.servicing(), Servicing::Irq);

    cpu.raise_nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 0x66);
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 0x38);
    assert_eq!(cpu.servicing(), Servicing::Irq);
}

#[test]
fn nmi_wins_over_irq() {
    let mut bus = im1_program();
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    cpu.raise_irq();
    cpu.raise_nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 0x0066);
}

#[test]
fn mode2_reads_vector_table() {
    let mut bus = SimpleBus::new();
    // LD A,#80 ; LD I,A ; IM 2 ; EI ; NOP
    bus.load(0, &[0x3E, 0x80, 0xED, 0x47, 0xED, 0x5E, 0xFB, 0x00, 0x00]);
    bus.load(0x8010, &[0x34, 0x12]);
    bus.ack_byte = 0x10;
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..5 {
        cpu.step(&mut bus);
    }
    cpu.raise_irq();
    assert_eq!(cpu.step(&mut bus).get(), 19);
    assert_eq!(cpu.registers().pc, 0x1234);
    assert_eq!(cpu.registers().wz, 0x1234);
}

#[test]
fn mode0_executes_acknowledged_instruction() {
    let mut bus = SimpleBus::new();
    // EI ; NOP ; NOP (mode 0 after power on)
    bus.load(0, &[0xFB, 0x00, 0x00]);
    bus.ack_byte = 0xCF; // RST 08h
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    let r = cpu.registers().r;
    cpu.raise_irq();
    assert_eq!(cpu.step(&mut bus).get(), 13);
    let regs = cpu.registers();
    assert_eq!(regs.pc, 0x0008);
    assert_eq!(regs.r, r + 1);
    // Return address is the interrupted instruction.
    assert_eq!(bus.peek(0xFFFD), 0x02);
}

#[test]
fn halt_idles_until_interrupt() {
    let mut bus = SimpleBus::new();
    // IM 1 ; EI ; HALT ; at #38: RETI
    bus.load(0, &[0xED, 0x56, 0xFB, 0x76]);
    bus.load(0x38, &[0xED, 0x4D]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert!(cpu.is_halted());
    assert_eq!(cpu.registers().pc, 4);

    let r = cpu.registers().r;
    for _ in 0..5 {
        assert_eq!(cpu.step(&mut bus).get(), 4);
    }
    assert_eq!(cpu.registers().r, r + 5);
    assert_eq!(cpu.registers().pc, 4);

    cpu.raise_irq();
    cpu.step(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.registers().pc, 0x0038);

    cpu.lower_irq();
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().pc, 4);
    assert_eq!(bus.reti_count, 1);
    assert_eq!(cpu.servicing(), Servicing::Idle);
    // RETI leaves IFF1 alone.
    assert!(!cpu.registers().iff1);
}

/// Bus whose port `#10` asserts the interrupt line.
struct IrqDevice {
    inner: SimpleBus,
}

impl Bus for IrqDevice {
    fn read(&mut self, address: u16, time: EmuTime, cpu: &mut dyn CpuLink) -> u8 {
        self.inner.read(address, time, cpu)
    }

    fn write(&mut self, address: u16, value: u8, time: EmuTime, cpu: &mut dyn CpuLink) {
        self.inner.write(address, value, time, cpu);
    }

    fn io_read(&mut self, port: u16, time: EmuTime, cpu: &mut dyn CpuLink) -> u8 {
        self.inner.io_read(port, time, cpu)
    }

    fn io_write(&mut self, port: u16, value: u8, time: EmuTime, cpu: &mut dyn CpuLink) {
        if port & 0xFF == 0x10 {
            cpu.raise_irq();
        }
        self.inner.io_write(port, value, time, cpu);
    }

    fn peek(&self, address: u16) -> u8 {
        self.inner.peek(address)
    }
}

#[test]
fn device_raises_irq_during_execute() {
    let mut inner = SimpleBus::new();
    // IM 1 ; EI ; OUT (#10),A ; loop: JR loop ; at #38: JR #38
    inner.load(0, &[0xED, 0x56, 0xFB, 0xD3, 0x10, 0x18, 0xFE]);
    inner.load(0x38, &[0x18, 0xFE]);
    let mut bus = IrqDevice { inner };

    let mut sched = SimpleScheduler::new();
    let stop = EmuTime::from_ticks(200 * 960);
    sched.schedule_sync_point(stop, SyncTag(7));

    let mut cpu = Z80::new(EmuTime::ZERO);
    assert_eq!(cpu.execute(&mut bus, &mut sched), ExitReason::SyncPoint(stop));
    assert_eq!(cpu.registers().pc, 0x0038);
    assert_eq!(cpu.irq_count(), 1);
    assert_eq!(cpu.servicing(), Servicing::Irq);
    // Return address: the JR after OUT.
    assert_eq!(bus.peek(0xFFFD), 0x05);
}
