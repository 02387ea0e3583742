//! One-instruction disassembler.
//!
//! Reads through [`Bus::peek`] so it never disturbs the machine. Output is
//! lowercase with `#`-prefixed uppercase hex, e.g. `ld (ix+#12),a`.

#![allow(clippy::cast_possible_wrap)]

use emu_core::Bus;

use crate::opcodes::{AluOp, BlockOp, Cond, Mem, Op, R8, R16, RotOp, Table};

struct Cursor<'a, B: ?Sized> {
    bus: &'a B,
    start: u16,
    len: u16,
    /// Displacement already read (DDCB/FDCB forms place it before the opcode).
    disp: Option<i8>,
}

impl<B: Bus + ?Sized> Cursor<'_, B> {
    fn byte(&mut self) -> u8 {
        let value = self.bus.peek(self.start.wrapping_add(self.len));
        self.len += 1;
        value
    }

    fn word(&mut self) -> u16 {
        let lo = self.byte();
        let hi = self.byte();
        u16::from_le_bytes([lo, hi])
    }

    fn n(&mut self) -> String {
        format!("#{:02X}", self.byte())
    }

    fn nn(&mut self) -> String {
        format!("#{:04X}", self.word())
    }

    /// Absolute target of a relative jump.
    fn rel(&mut self) -> String {
        let d = self.byte() as i8;
        let target = self
            .start
            .wrapping_add(self.len)
            .wrapping_add_signed(i16::from(d));
        format!("#{target:04X}")
    }

    fn mem(&mut self, mem: Mem) -> String {
        let base = match mem {
            Mem::Hl => return "(hl)".to_string(),
            Mem::Ix => "ix",
            Mem::Iy => "iy",
        };
        let d = match self.disp {
            Some(d) => d,
            None => self.byte() as i8,
        };
        let sign = if d < 0 { '-' } else { '+' };
        format!("({base}{sign}#{:02X})", d.unsigned_abs())
    }
}

const fn r8(r: R8) -> &'static str {
    match r {
        R8::B => "b",
        R8::C => "c",
        R8::D => "d",
        R8::E => "e",
        R8::H => "h",
        R8::L => "l",
        R8::A => "a",
        R8::Ixh => "ixh",
        R8::Ixl => "ixl",
        R8::Iyh => "iyh",
        R8::Iyl => "iyl",
    }
}

const fn r16(rr: R16) -> &'static str {
    match rr {
        R16::Bc => "bc",
        R16::De => "de",
        R16::Hl => "hl",
        R16::Sp => "sp",
        R16::Af => "af",
        R16::Ix => "ix",
        R16::Iy => "iy",
    }
}

const fn cond(c: Cond) -> &'static str {
    match c {
        Cond::Nz => "nz",
        Cond::Z => "z",
        Cond::Nc => "nc",
        Cond::C => "c",
        Cond::Po => "po",
        Cond::Pe => "pe",
        Cond::P => "p",
        Cond::M => "m",
    }
}

/// Mnemonic including the separator before the operand.
const fn alu(op: AluOp) -> &'static str {
    match op {
        AluOp::Add => "add a,",
        AluOp::Adc => "adc a,",
        AluOp::Sub => "sub ",
        AluOp::Sbc => "sbc a,",
        AluOp::And => "and ",
        AluOp::Xor => "xor ",
        AluOp::Or => "or ",
        AluOp::Cp => "cp ",
    }
}

const fn rot(op: RotOp) -> &'static str {
    match op {
        RotOp::Rlc => "rlc",
        RotOp::Rrc => "rrc",
        RotOp::Rl => "rl",
        RotOp::Rr => "rr",
        RotOp::Sla => "sla",
        RotOp::Sra => "sra",
        RotOp::Sll => "sll",
        RotOp::Srl => "srl",
    }
}

const fn block(op: BlockOp) -> &'static str {
    match op {
        BlockOp::Ldi => "ldi",
        BlockOp::Ldd => "ldd",
        BlockOp::Ldir => "ldir",
        BlockOp::Lddr => "lddr",
        BlockOp::Cpi => "cpi",
        BlockOp::Cpd => "cpd",
        BlockOp::Cpir => "cpir",
        BlockOp::Cpdr => "cpdr",
        BlockOp::Ini => "ini",
        BlockOp::Ind => "ind",
        BlockOp::Inir => "inir",
        BlockOp::Indr => "indr",
        BlockOp::Outi => "outi",
        BlockOp::Outd => "outd",
        BlockOp::Otir => "otir",
        BlockOp::Otdr => "otdr",
    }
}

fn copy_suffix(copy: Option<R8>) -> String {
    copy.map_or_else(String::new, |r| format!(",{}", r8(r)))
}

/// Disassemble the instruction at `address`.
///
/// Returns the text and the instruction length in bytes. A run of index
/// prefixes is shown one `db` per redundant prefix, matching how the CPU
/// executes it.
pub fn disassemble<B: Bus + ?Sized>(bus: &B, address: u16, has_multiply: bool) -> (String, u16) {
    let mut c = Cursor {
        bus,
        start: address,
        len: 0,
        disp: None,
    };
    let mut table = Table::Main;
    loop {
        let opcode = c.byte();
        match table.lookup(opcode) {
            Op::Prefix(Table::Dd | Table::Fd) if table.is_index() => {
                return (format!("db #{:02X}", bus.peek(address)), 1);
            }
            Op::Prefix(next @ (Table::DdCb | Table::FdCb)) => {
                c.disp = Some(c.byte() as i8);
                let code = c.byte();
                let text = render(&mut c, next.lookup(code), code, has_multiply);
                return (text, c.len);
            }
            Op::Prefix(next) => table = next,
            op => {
                let text = render(&mut c, op, opcode, has_multiply);
                return (text, c.len);
            }
        }
    }
}

#[allow(clippy::too_many_lines)]
fn render<B: Bus + ?Sized>(c: &mut Cursor<'_, B>, op: Op, opcode: u8, has_multiply: bool) -> String {
    match op {
        Op::Nop => "nop".into(),
        Op::Prefix(_) => format!("db #{opcode:02X}"),

        Op::LdRR(d, s) => format!("ld {},{}", r8(d), r8(s)),
        Op::LdRN(r) => format!("ld {},{}", r8(r), c.n()),
        Op::LdRMem(r, m) => format!("ld {},{}", r8(r), c.mem(m)),
        Op::LdMemR(m, r) => format!("ld {},{}", c.mem(m), r8(r)),
        Op::LdMemN(m) => {
            let dst = c.mem(m);
            format!("ld {dst},{}", c.n())
        }
        Op::LdAInd(rr) => format!("ld a,({})", r16(rr)),
        Op::LdIndA(rr) => format!("ld ({}),a", r16(rr)),
        Op::LdAAbs => format!("ld a,({})", c.nn()),
        Op::LdAbsA => format!("ld ({}),a", c.nn()),

        Op::LdRrNn(rr) => format!("ld {},{}", r16(rr), c.nn()),
        Op::LdRrAbs(rr) => format!("ld {},({})", r16(rr), c.nn()),
        Op::LdAbsRr(rr) => format!("ld ({}),{}", c.nn(), r16(rr)),
        Op::LdSpRr(rr) => format!("ld sp,{}", r16(rr)),
        Op::Push(rr) => format!("push {}", r16(rr)),
        Op::Pop(rr) => format!("pop {}", r16(rr)),
        Op::ExDeHl => "ex de,hl".into(),
        Op::ExAfAf => "ex af,af'".into(),
        Op::Exx => "exx".into(),
        Op::ExSpRr(rr) => format!("ex (sp),{}", r16(rr)),

        Op::Alu(a, r) => format!("{}{}", alu(a), r8(r)),
        Op::AluN(a) => format!("{}{}", alu(a), c.n()),
        Op::AluMem(a, m) => format!("{}{}", alu(a), c.mem(m)),
        Op::Inc(r) => format!("inc {}", r8(r)),
        Op::Dec(r) => format!("dec {}", r8(r)),
        Op::IncMem(m) => format!("inc {}", c.mem(m)),
        Op::DecMem(m) => format!("dec {}", c.mem(m)),
        Op::Inc16(rr) => format!("inc {}", r16(rr)),
        Op::Dec16(rr) => format!("dec {}", r16(rr)),
        Op::Add16(d, s) => format!("add {},{}", r16(d), r16(s)),
        Op::Adc16(rr) => format!("adc hl,{}", r16(rr)),
        Op::Sbc16(rr) => format!("sbc hl,{}", r16(rr)),

        Op::Rlca => "rlca".into(),
        Op::Rrca => "rrca".into(),
        Op::Rla => "rla".into(),
        Op::Rra => "rra".into(),
        Op::Daa => "daa".into(),
        Op::Cpl => "cpl".into(),
        Op::Scf => "scf".into(),
        Op::Ccf => "ccf".into(),

        Op::Halt => "halt".into(),
        Op::Di => "di".into(),
        Op::Ei => "ei".into(),
        Op::Jp => format!("jp {}", c.nn()),
        Op::JpCc(cc) => format!("jp {},{}", cond(cc), c.nn()),
        Op::JpRr(rr) => format!("jp ({})", r16(rr)),
        Op::Jr => format!("jr {}", c.rel()),
        Op::JrCc(cc) => format!("jr {},{}", cond(cc), c.rel()),
        Op::Djnz => format!("djnz {}", c.rel()),
        Op::Call => format!("call {}", c.nn()),
        Op::CallCc(cc) => format!("call {},{}", cond(cc), c.nn()),
        Op::Ret => "ret".into(),
        Op::RetCc(cc) => format!("ret {}", cond(cc)),
        Op::Rst(v) => format!("rst #{v:02X}"),

        Op::OutNA => format!("out ({}),a", c.n()),
        Op::InAN => format!("in a,({})", c.n()),
        Op::InRC(r) => format!("in {},(c)", r.map_or("f", r8)),
        Op::OutCR(r) => format!("out (c),{}", r.map_or("0", r8)),

        Op::Rot(o, r) => format!("{} {}", rot(o), r8(r)),
        Op::RotMem(o, m, copy) => format!("{} {}{}", rot(o), c.mem(m), copy_suffix(copy)),
        Op::Bit(n, r) => format!("bit {n},{}", r8(r)),
        Op::BitMem(n, m) => format!("bit {n},{}", c.mem(m)),
        Op::Res(n, r) => format!("res {n},{}", r8(r)),
        Op::ResMem(n, m, copy) => format!("res {n},{}{}", c.mem(m), copy_suffix(copy)),
        Op::Set(n, r) => format!("set {n},{}", r8(r)),
        Op::SetMem(n, m, copy) => format!("set {n},{}{}", c.mem(m), copy_suffix(copy)),

        Op::Neg => "neg".into(),
        Op::Retn => "retn".into(),
        Op::Reti => "reti".into(),
        Op::Im(mode) => format!("im {mode}"),
        Op::LdIA => "ld i,a".into(),
        Op::LdRA => "ld r,a".into(),
        Op::LdAI => "ld a,i".into(),
        Op::LdAR => "ld a,r".into(),
        Op::Rrd => "rrd".into(),
        Op::Rld => "rld".into(),
        Op::Block(b) => block(b).into(),
        Op::Mulub(r) if has_multiply => format!("mulub a,{}", r8(r)),
        Op::Muluw(rr) if has_multiply => format!("muluw hl,{}", r16(rr)),
        Op::Mulub(_) | Op::Muluw(_) | Op::EdNop => format!("db #ED,#{opcode:02X}"),
    }
}
