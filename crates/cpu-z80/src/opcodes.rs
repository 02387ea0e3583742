//! Opcode dispatch tables.
//!
//! Every prefix context has a fixed 256-entry table mapping an opcode byte
//! to one [`Op`]. The tables are built at compile time from the regular
//! x/y/z structure of the instruction set. Index-prefixed tables are built
//! from the same decoder with `HL`, `H`, `L` and `(HL)` replaced by their
//! index-register forms, so opcodes that never touch `HL` alias to their
//! unprefixed behaviour explicitly.

/// Prefix context an opcode byte is decoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Table {
    Main,
    Cb,
    Ed,
    Dd,
    Fd,
    DdCb,
    FdCb,
}

/// 8-bit register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
    Ixh,
    Ixl,
    Iyh,
    Iyl,
}

/// 16-bit register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    Ix,
    Iy,
}

/// Memory operand addressed through a register.
///
/// `Ix` and `Iy` carry a signed displacement byte in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mem {
    Hl,
    Ix,
    Iy,
}

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

/// Accumulator arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// CB-space rotates and shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sll,
    Srl,
}

/// ED-space block transfer, search and I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOp {
    Ldi,
    Ldd,
    Ldir,
    Lddr,
    Cpi,
    Cpd,
    Cpir,
    Cpdr,
    Ini,
    Ind,
    Inir,
    Indr,
    Outi,
    Outd,
    Otir,
    Otdr,
}

impl BlockOp {
    /// True for the auto-repeating forms.
    #[must_use]
    pub const fn repeats(self) -> bool {
        matches!(
            self,
            Self::Ldir | Self::Lddr | Self::Cpir | Self::Cpdr | Self::Inir | Self::Indr | Self::Otir | Self::Otdr
        )
    }

    /// True for the forms that walk memory downwards.
    #[must_use]
    pub const fn decrements(self) -> bool {
        matches!(
            self,
            Self::Ldd | Self::Lddr | Self::Cpd | Self::Cpdr | Self::Ind | Self::Indr | Self::Outd | Self::Otdr
        )
    }
}

/// One decoded operation.
///
/// Immediate operands and displacements are not part of the table entry;
/// the executor fetches them from the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Prefix(Table),

    // 8-bit loads
    LdRR(R8, R8),
    LdRN(R8),
    LdRMem(R8, Mem),
    LdMemR(Mem, R8),
    LdMemN(Mem),
    LdAInd(R16),
    LdIndA(R16),
    LdAAbs,
    LdAbsA,

    // 16-bit loads and stack
    LdRrNn(R16),
    LdRrAbs(R16),
    LdAbsRr(R16),
    LdSpRr(R16),
    Push(R16),
    Pop(R16),
    ExDeHl,
    ExAfAf,
    Exx,
    ExSpRr(R16),

    // Arithmetic
    Alu(AluOp, R8),
    AluN(AluOp),
    AluMem(AluOp, Mem),
    Inc(R8),
    Dec(R8),
    IncMem(Mem),
    DecMem(Mem),
    Inc16(R16),
    Dec16(R16),
    Add16(R16, R16),
    Adc16(R16),
    Sbc16(R16),

    // Accumulator and flag operations
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,

    // Control
    Halt,
    Di,
    Ei,
    Jp,
    JpCc(Cond),
    JpRr(R16),
    Jr,
    JrCc(Cond),
    Djnz,
    Call,
    CallCc(Cond),
    Ret,
    RetCc(Cond),
    Rst(u8),

    // I/O
    OutNA,
    InAN,
    /// `IN r,(C)`; `None` only sets flags (`IN F,(C)`).
    InRC(Option<R8>),
    /// `OUT (C),r`; `None` writes zero.
    OutCR(Option<R8>),

    // CB space. The optional register receives a copy of the result
    // (undocumented DDCB/FDCB forms).
    Rot(RotOp, R8),
    RotMem(RotOp, Mem, Option<R8>),
    Bit(u8, R8),
    BitMem(u8, Mem),
    Res(u8, R8),
    ResMem(u8, Mem, Option<R8>),
    Set(u8, R8),
    SetMem(u8, Mem, Option<R8>),

    // ED space
    Neg,
    Retn,
    Reti,
    Im(u8),
    LdIA,
    LdRA,
    LdAI,
    LdAR,
    Rrd,
    Rld,
    Block(BlockOp),
    Mulub(R8),
    Muluw(R16),
    /// Undefined ED opcode; behaves as a two-byte NOP.
    EdNop,
}

#[derive(Clone, Copy)]
enum Index {
    Hl,
    Ix,
    Iy,
}

const COND: [Cond; 8] = [Cond::Nz, Cond::Z, Cond::Nc, Cond::C, Cond::Po, Cond::Pe, Cond::P, Cond::M];

const ALU: [AluOp; 8] = [
    AluOp::Add,
    AluOp::Adc,
    AluOp::Sub,
    AluOp::Sbc,
    AluOp::And,
    AluOp::Xor,
    AluOp::Or,
    AluOp::Cp,
];

const ROT: [RotOp; 8] = [
    RotOp::Rlc,
    RotOp::Rrc,
    RotOp::Rl,
    RotOp::Rr,
    RotOp::Sla,
    RotOp::Sra,
    RotOp::Sll,
    RotOp::Srl,
];

const BLOCK: [[BlockOp; 4]; 4] = [
    [BlockOp::Ldi, BlockOp::Cpi, BlockOp::Ini, BlockOp::Outi],
    [BlockOp::Ldd, BlockOp::Cpd, BlockOp::Ind, BlockOp::Outd],
    [BlockOp::Ldir, BlockOp::Cpir, BlockOp::Inir, BlockOp::Otir],
    [BlockOp::Lddr, BlockOp::Cpdr, BlockOp::Indr, BlockOp::Otdr],
];

/// Register for a 3-bit register field (never 6, which is memory).
const fn reg(code: u8, idx: Index) -> R8 {
    match (code, idx) {
        (0, _) => R8::B,
        (1, _) => R8::C,
        (2, _) => R8::D,
        (3, _) => R8::E,
        (4, Index::Ix) => R8::Ixh,
        (4, Index::Iy) => R8::Iyh,
        (4, Index::Hl) => R8::H,
        (5, Index::Ix) => R8::Ixl,
        (5, Index::Iy) => R8::Iyl,
        (5, Index::Hl) => R8::L,
        _ => R8::A,
    }
}

const fn mem(idx: Index) -> Mem {
    match idx {
        Index::Hl => Mem::Hl,
        Index::Ix => Mem::Ix,
        Index::Iy => Mem::Iy,
    }
}

const fn hl(idx: Index) -> R16 {
    match idx {
        Index::Hl => R16::Hl,
        Index::Ix => R16::Ix,
        Index::Iy => R16::Iy,
    }
}

/// Register pair for the `rp` field (BC, DE, HL, SP).
const fn rp(p: u8, idx: Index) -> R16 {
    match p {
        0 => R16::Bc,
        1 => R16::De,
        2 => hl(idx),
        _ => R16::Sp,
    }
}

/// Register pair for the `rp2` field (BC, DE, HL, AF).
const fn rp2(p: u8, idx: Index) -> R16 {
    match p {
        3 => R16::Af,
        _ => rp(p, idx),
    }
}

const fn decode_base(op: u8, idx: Index) -> Op {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;
    match x {
        0 => match z {
            0 => match y {
                0 => Op::Nop,
                1 => Op::ExAfAf,
                2 => Op::Djnz,
                3 => Op::Jr,
                _ => Op::JrCc(COND[(y - 4) as usize]),
            },
            1 => {
                if q == 0 {
                    Op::LdRrNn(rp(p, idx))
                } else {
                    Op::Add16(hl(idx), rp(p, idx))
                }
            }
            2 => match (q, p) {
                (0, 0) => Op::LdIndA(R16::Bc),
                (0, 1) => Op::LdIndA(R16::De),
                (0, 2) => Op::LdAbsRr(hl(idx)),
                (0, _) => Op::LdAbsA,
                (_, 0) => Op::LdAInd(R16::Bc),
                (_, 1) => Op::LdAInd(R16::De),
                (_, 2) => Op::LdRrAbs(hl(idx)),
                _ => Op::LdAAbs,
            },
            3 => {
                if q == 0 {
                    Op::Inc16(rp(p, idx))
                } else {
                    Op::Dec16(rp(p, idx))
                }
            }
            4 => {
                if y == 6 {
                    Op::IncMem(mem(idx))
                } else {
                    Op::Inc(reg(y, idx))
                }
            }
            5 => {
                if y == 6 {
                    Op::DecMem(mem(idx))
                } else {
                    Op::Dec(reg(y, idx))
                }
            }
            6 => {
                if y == 6 {
                    Op::LdMemN(mem(idx))
                } else {
                    Op::LdRN(reg(y, idx))
                }
            }
            _ => match y {
                0 => Op::Rlca,
                1 => Op::Rrca,
                2 => Op::Rla,
                3 => Op::Rra,
                4 => Op::Daa,
                5 => Op::Cpl,
                6 => Op::Scf,
                _ => Op::Ccf,
            },
        },
        1 => {
            if y == 6 && z == 6 {
                Op::Halt
            } else if z == 6 {
                // The register operand is never an index half when memory
                // is addressed through the index register.
                Op::LdRMem(reg(y, Index::Hl), mem(idx))
            } else if y == 6 {
                Op::LdMemR(mem(idx), reg(z, Index::Hl))
            } else {
                Op::LdRR(reg(y, idx), reg(z, idx))
            }
        }
        2 => {
            if z == 6 {
                Op::AluMem(ALU[y as usize], mem(idx))
            } else {
                Op::Alu(ALU[y as usize], reg(z, idx))
            }
        }
        _ => match z {
            0 => Op::RetCc(COND[y as usize]),
            1 => match (q, p) {
                (0, _) => Op::Pop(rp2(p, idx)),
                (_, 0) => Op::Ret,
                (_, 1) => Op::Exx,
                (_, 2) => Op::JpRr(hl(idx)),
                _ => Op::LdSpRr(hl(idx)),
            },
            2 => Op::JpCc(COND[y as usize]),
            3 => match y {
                0 => Op::Jp,
                1 => match idx {
                    Index::Hl => Op::Prefix(Table::Cb),
                    Index::Ix => Op::Prefix(Table::DdCb),
                    Index::Iy => Op::Prefix(Table::FdCb),
                },
                2 => Op::OutNA,
                3 => Op::InAN,
                4 => Op::ExSpRr(hl(idx)),
                5 => Op::ExDeHl,
                6 => Op::Di,
                _ => Op::Ei,
            },
            4 => Op::CallCc(COND[y as usize]),
            5 => match (q, p) {
                (0, _) => Op::Push(rp2(p, idx)),
                (_, 0) => Op::Call,
                (_, 1) => Op::Prefix(Table::Dd),
                (_, 2) => Op::Prefix(Table::Ed),
                _ => Op::Prefix(Table::Fd),
            },
            6 => Op::AluN(ALU[y as usize]),
            _ => Op::Rst(y * 8),
        },
    }
}

const fn decode_cb(op: u8, memory: Mem, indexed: bool) -> Op {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    if indexed {
        // Every DDCB/FDCB opcode operates on (IX+d); the register field
        // only selects where a copy of the result goes.
        let copy = if z == 6 { None } else { Some(reg(z, Index::Hl)) };
        return match x {
            0 => Op::RotMem(ROT[y as usize], memory, copy),
            1 => Op::BitMem(y, memory),
            2 => Op::ResMem(y, memory, copy),
            _ => Op::SetMem(y, memory, copy),
        };
    }
    if z == 6 {
        return match x {
            0 => Op::RotMem(ROT[y as usize], Mem::Hl, None),
            1 => Op::BitMem(y, Mem::Hl),
            2 => Op::ResMem(y, Mem::Hl, None),
            _ => Op::SetMem(y, Mem::Hl, None),
        };
    }
    let r = reg(z, Index::Hl);
    match x {
        0 => Op::Rot(ROT[y as usize], r),
        1 => Op::Bit(y, r),
        2 => Op::Res(y, r),
        _ => Op::Set(y, r),
    }
}

const fn decode_ed(op: u8) -> Op {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = y >> 1;
    let q = y & 1;
    match x {
        1 => match z {
            0 => Op::InRC(if y == 6 { None } else { Some(reg(y, Index::Hl)) }),
            1 => Op::OutCR(if y == 6 { None } else { Some(reg(y, Index::Hl)) }),
            2 => {
                if q == 0 {
                    Op::Sbc16(rp(p, Index::Hl))
                } else {
                    Op::Adc16(rp(p, Index::Hl))
                }
            }
            3 => {
                if q == 0 {
                    Op::LdAbsRr(rp(p, Index::Hl))
                } else {
                    Op::LdRrAbs(rp(p, Index::Hl))
                }
            }
            4 => Op::Neg,
            5 => {
                if y == 1 {
                    Op::Reti
                } else {
                    Op::Retn
                }
            }
            6 => Op::Im([0, 0, 1, 2, 0, 0, 1, 2][y as usize]),
            _ => match y {
                0 => Op::LdIA,
                1 => Op::LdRA,
                2 => Op::LdAI,
                3 => Op::LdAR,
                4 => Op::Rrd,
                5 => Op::Rld,
                _ => Op::EdNop,
            },
        },
        2 if z <= 3 && y >= 4 => Op::Block(BLOCK[(y - 4) as usize][z as usize]),
        3 if z == 1 && y != 6 => Op::Mulub(reg(y, Index::Hl)),
        3 if z == 3 && q == 0 => Op::Muluw(rp(p, Index::Hl)),
        _ => Op::EdNop,
    }
}

const fn build(table: Table) -> [Op; 256] {
    let mut ops = [Op::Nop; 256];
    let mut i = 0;
    while i < 256 {
        let op = i as u8;
        ops[i] = match table {
            Table::Main => decode_base(op, Index::Hl),
            Table::Dd => decode_base(op, Index::Ix),
            Table::Fd => decode_base(op, Index::Iy),
            Table::Cb => decode_cb(op, Mem::Hl, false),
            Table::DdCb => decode_cb(op, Mem::Ix, true),
            Table::FdCb => decode_cb(op, Mem::Iy, true),
            Table::Ed => decode_ed(op),
        };
        i += 1;
    }
    ops
}

static MAIN: [Op; 256] = build(Table::Main);
static CB: [Op; 256] = build(Table::Cb);
static ED: [Op; 256] = build(Table::Ed);
static DD: [Op; 256] = build(Table::Dd);
static FD: [Op; 256] = build(Table::Fd);
static DDCB: [Op; 256] = build(Table::DdCb);
static FDCB: [Op; 256] = build(Table::FdCb);

impl Table {
    /// The dispatch table for this context.
    #[must_use]
    pub fn ops(self) -> &'static [Op; 256] {
        match self {
            Self::Main => &MAIN,
            Self::Cb => &CB,
            Self::Ed => &ED,
            Self::Dd => &DD,
            Self::Fd => &FD,
            Self::DdCb => &DDCB,
            Self::FdCb => &FDCB,
        }
    }

    /// Decode `opcode` in this context.
    #[must_use]
    pub fn lookup(self, opcode: u8) -> Op {
        self.ops()[usize::from(opcode)]
    }

    /// True for the index-register contexts (`DD`, `FD`).
    #[must_use]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::Dd | Self::Fd)
    }
}
