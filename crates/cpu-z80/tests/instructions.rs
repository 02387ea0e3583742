//! Instruction behaviour and timing on both personalities.

use cpu_z80::{CF, HF, MAX_FREQ, NF, PF, R800, SF, Z80, ZF};
use emu_core::{Cpu, EmuTime, SimpleBus};

fn bus_with(program: &[u8]) -> SimpleBus {
    let mut bus = SimpleBus::new();
    bus.load(0, program);
    bus
}

#[test]
fn load_then_copy_z80() {
    let mut bus = bus_with(&[0x3E, 0x42, 0x47]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    assert_eq!(cpu.step(&mut bus).get(), 7);
    assert_eq!(cpu.step(&mut bus).get(), 4);
    let regs = cpu.registers();
    assert_eq!(regs.b, 0x42);
    assert_eq!(regs.pc, 3);
    assert_eq!(cpu.time(), EmuTime::from_ticks(11 * 960));
}

#[test]
fn load_then_copy_r800() {
    let mut bus = bus_with(&[0x3E, 0x42, 0x47]);
    let mut cpu = R800::new(EmuTime::ZERO);
    assert_eq!(cpu.step(&mut bus).get(), 2);
    assert_eq!(cpu.step(&mut bus).get(), 1);
    assert_eq!(cpu.registers().b, 0x42);
    assert_eq!(cpu.registers().pc, 3);
    assert_eq!(cpu.time(), EmuTime::from_ticks(3 * 480));
}

#[test]
fn indexed_bit_costs_displacement_fetch() {
    // BIT 0,(HL) ; BIT 0,(IX+5)
    let program = [0xCB, 0x46, 0xDD, 0xCB, 0x05, 0x46];

    let mut bus = bus_with(&program);
    let mut z80 = Z80::new(EmuTime::ZERO);
    assert_eq!(z80.step(&mut bus).get(), 12);
    assert_eq!(z80.step(&mut bus).get(), 20);

    let mut r800 = R800::new(EmuTime::ZERO);
    assert_eq!(r800.step(&mut bus).get(), 3);
    assert_eq!(r800.step(&mut bus).get(), 5);
}

#[test]
fn documented_z80_costs() {
    let cases: &[(&[u8], u64)] = &[
        (&[0x00], 4),
        (&[0x01, 0x34, 0x12], 10),
        (&[0x09], 11),
        (&[0xDD, 0x09], 15),
        (&[0x34], 11),
        (&[0xDD, 0x34, 0x00], 23),
        (&[0xE3], 19),
        (&[0xC5], 11),
        (&[0xED, 0x42], 15),
        (&[0xED, 0x47], 9),
        (&[0xED, 0x5F], 9),
        (&[0xED, 0x67], 18),
        (&[0xED, 0x78], 12),
        (&[0xCB, 0xC6], 15),
        (&[0xDD, 0xCB, 0x00, 0xC6], 23),
        (&[0xED, 0x00], 8),
        (&[0x22, 0x00, 0x80], 16),
        (&[0xED, 0x43, 0x00, 0x80], 20),
    ];
    for &(program, cost) in cases {
        let mut bus = bus_with(program);
        let mut cpu = Z80::new(EmuTime::ZERO);
        assert_eq!(cpu.step(&mut bus).get(), cost, "{program:02X?}");
        assert_eq!(cpu.registers().pc, program.len() as u16, "{program:02X?}");
    }
}

#[test]
fn conditional_costs_depend_on_outcome() {
    // XOR A (Z set) ; JR NZ,+0 ; JR Z,+0 ; RET NZ ; CALL NZ,0
    let mut bus = bus_with(&[0xAF, 0x20, 0x00, 0x28, 0x00, 0xC0, 0xC4, 0x00, 0x00]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    let costs: Vec<u64> = (0..5).map(|_| cpu.step(&mut bus).get()).collect();
    assert_eq!(costs, vec![4, 7, 12, 5, 10]);
}

#[test]
fn add_sets_overflow_and_half_carry() {
    // LD A,#7F ; ADD A,1
    let mut bus = bus_with(&[0x3E, 0x7F, 0xC6, 0x01]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    let regs = cpu.registers();
    assert_eq!(regs.a, 0x80);
    assert_eq!(regs.f, SF | HF | PF);
}

#[test]
fn daa_corrects_bcd_addition() {
    // LD A,#15 ; ADD A,#27 ; DAA
    let mut bus = bus_with(&[0x3E, 0x15, 0xC6, 0x27, 0x27]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().a, 0x42);
    assert_eq!(cpu.registers().f & CF, 0);
}

#[test]
fn neg_and_sbc() {
    // LD A,1 ; NEG ; LD HL,#1000 ; LD DE,#1001 ; AND A ; SBC HL,DE
    let mut bus = bus_with(&[
        0x3E, 0x01, 0xED, 0x44, 0x21, 0x00, 0x10, 0x11, 0x01, 0x10, 0xA7, 0xED, 0x52,
    ]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().a, 0xFF);
    assert_ne!(cpu.registers().f & (CF | NF), 0);
    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    let regs = cpu.registers();
    assert_eq!(regs.hl(), 0xFFFF);
    assert_ne!(regs.f & CF, 0);
    assert_ne!(regs.f & SF, 0);
    assert_eq!(regs.f & ZF, 0);
}

#[test]
fn exchanges_twice_are_identity() {
    // LD BC,#1234 ; EXX ; LD BC,#5678 ; EXX ; EXX ; EXX ; EX AF,AF' ; EX AF,AF'
    let mut bus = bus_with(&[
        0x01, 0x34, 0x12, 0xD9, 0x01, 0x78, 0x56, 0xD9, 0xD9, 0xD9, 0x08, 0x08,
    ]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    let before = cpu.registers();
    assert_eq!(before.bc(), 0x1234);
    assert_eq!(before.bc_alt(), 0x5678);
    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    let after = cpu.registers();
    assert_eq!(after.bc(), before.bc());
    assert_eq!(after.bc_alt(), before.bc_alt());
    assert_eq!(after.af(), before.af());
}

#[test]
fn ld_a_i_copies_iff2() {
    // EI ; LD A,I
    let mut bus = bus_with(&[0xFB, 0xED, 0x57]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_ne!(cpu.registers().f & PF, 0);
}

#[test]
fn frequency_change_applies_to_next_instruction() {
    let mut bus = bus_with(&[0x00, 0x00]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    assert_eq!(cpu.time(), EmuTime::from_ticks(4 * 960));
    cpu.set_freq_value(7_159_090).unwrap();
    cpu.set_freq_locked(true);
    cpu.step(&mut bus);
    assert_eq!(cpu.time(), EmuTime::from_ticks(4 * 960 + 4 * 480));
}

#[test]
fn locked_frequency_keeps_fractional_ticks() {
    // 1 GHz does not divide the master clock: 3.436 ticks per cycle.
    let mut bus = SimpleBus::new();
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.set_freq_value(MAX_FREQ).unwrap();
    cpu.set_freq_locked(true);
    for _ in 0..250_000 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.cycles(), 1_000_000);
    assert_eq!(cpu.time(), EmuTime::from_ticks(3_436_363));
}

#[test]
fn undocumented_index_halves() {
    // LD IX,#1234 ; LD A,IXH ; ADD A,IXL
    let mut bus = bus_with(&[0xDD, 0x21, 0x34, 0x12, 0xDD, 0x7C, 0xDD, 0x85]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().a, 0x46);
}

#[test]
fn sll_shifts_in_one() {
    // LD B,#80 ; SLL B
    let mut bus = bus_with(&[0x06, 0x80, 0xCB, 0x30]);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().b, 0x01);
    assert_ne!(cpu.registers().f & CF, 0);
}

#[test]
fn in_f_c_only_sets_flags() {
    let mut bus = bus_with(&[0xED, 0x70]);
    bus.set_port(0x20, 0x00);
    let mut cpu = Z80::new(EmuTime::ZERO);
    cpu.registers_mut().c = 0x20;
    cpu.step(&mut bus);
    let regs = cpu.registers();
    assert_ne!(regs.f & ZF, 0);
    assert_ne!(regs.f & PF, 0);
    assert_eq!(regs.a, 0xFF);
}
