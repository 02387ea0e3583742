//! CPU variant policy.
//!
//! The Z80 and the R800 decode the same instruction set through the same
//! engine. They differ only in cycle costs, default clock and the
//! availability of the R800 multiply instructions.

use crate::config::CpuKind;

/// Cycle costs of one CPU variant.
///
/// Every opcode or prefix byte fetched in an M1 cycle costs `m1`. The other
/// fields are what an instruction class costs on top of its M1 fetches.
/// Interrupt acceptance costs (`nmi`, `im1`, `im2`) are totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub m1: u32,

    pub ld_r_n: u32,
    pub ld_r_hl: u32,
    pub ld_hl_r: u32,
    pub ld_hl_n: u32,
    pub ld_r_xix: u32,
    pub ld_xix_r: u32,
    pub ld_xix_n: u32,
    pub ld_a_abs: u32,
    pub ld_rr_nn: u32,
    pub ld_hl_abs: u32,
    pub ld_sp_hl: u32,
    pub push: u32,
    pub pop: u32,
    pub ex_sp: u32,

    pub alu_n: u32,
    pub alu_hl: u32,
    pub alu_xix: u32,
    pub inc_hl: u32,
    pub inc_xix: u32,
    pub inc16: u32,
    pub add16: u32,
    pub adc16: u32,
    pub im: u32,
    pub ld_a_i: u32,

    pub jp: u32,
    pub jr: u32,
    pub jr_not_taken: u32,
    pub djnz: u32,
    pub djnz_not_taken: u32,
    pub call: u32,
    pub call_not_taken: u32,
    pub ret: u32,
    pub ret_cc_taken: u32,
    pub ret_cc_not_taken: u32,
    pub retn: u32,
    pub rst: u32,

    pub in_a_n: u32,
    pub in_r_c: u32,
    pub block: u32,
    pub block_repeat: u32,

    pub rot_hl: u32,
    pub bit_hl: u32,
    /// Displacement and opcode fetch of a DDCB/FDCB instruction.
    pub index_bit_fetch: u32,
    pub bit_xix: u32,
    pub rot_xix: u32,
    pub rld: u32,

    pub mulub: u32,
    pub muluw: u32,

    pub nmi: u32,
    pub im1: u32,
    pub im2: u32,
    /// Added to the acknowledged instruction in mode 0.
    pub im0_extra: u32,
}

/// Zilog documented T-states.
pub const Z80_TIMING: Timing = Timing {
    m1: 4,
    ld_r_n: 3,
    ld_r_hl: 3,
    ld_hl_r: 3,
    ld_hl_n: 6,
    ld_r_xix: 11,
    ld_xix_r: 11,
    ld_xix_n: 11,
    ld_a_abs: 9,
    ld_rr_nn: 6,
    ld_hl_abs: 12,
    ld_sp_hl: 2,
    push: 7,
    pop: 6,
    ex_sp: 15,
    alu_n: 3,
    alu_hl: 3,
    alu_xix: 11,
    inc_hl: 7,
    inc_xix: 15,
    inc16: 2,
    add16: 7,
    adc16: 7,
    im: 0,
    ld_a_i: 1,
    jp: 6,
    jr: 8,
    jr_not_taken: 3,
    djnz: 9,
    djnz_not_taken: 4,
    call: 13,
    call_not_taken: 6,
    ret: 6,
    ret_cc_taken: 7,
    ret_cc_not_taken: 1,
    retn: 6,
    rst: 7,
    in_a_n: 7,
    in_r_c: 4,
    block: 8,
    block_repeat: 5,
    rot_hl: 7,
    bit_hl: 4,
    index_bit_fetch: 8,
    bit_xix: 4,
    rot_xix: 7,
    rld: 10,
    mulub: 0,
    muluw: 0,
    nmi: 11,
    im1: 13,
    im2: 19,
    im0_extra: 2,
};

/// R800 cycle table, ignoring DRAM page-break penalties.
pub const R800_TIMING: Timing = Timing {
    m1: 1,
    ld_r_n: 1,
    ld_r_hl: 1,
    ld_hl_r: 1,
    ld_hl_n: 2,
    ld_r_xix: 3,
    ld_xix_r: 3,
    ld_xix_n: 3,
    ld_a_abs: 3,
    ld_rr_nn: 2,
    ld_hl_abs: 4,
    ld_sp_hl: 0,
    push: 3,
    pop: 2,
    ex_sp: 4,
    alu_n: 1,
    alu_hl: 1,
    alu_xix: 3,
    inc_hl: 3,
    inc_xix: 5,
    inc16: 0,
    add16: 0,
    adc16: 0,
    im: 1,
    ld_a_i: 0,
    jp: 2,
    jr: 2,
    jr_not_taken: 1,
    djnz: 2,
    djnz_not_taken: 1,
    call: 4,
    call_not_taken: 2,
    ret: 2,
    ret_cc_taken: 2,
    ret_cc_not_taken: 0,
    retn: 3,
    rst: 3,
    in_a_n: 2,
    in_r_c: 1,
    block: 2,
    block_repeat: 1,
    rot_hl: 3,
    bit_hl: 1,
    index_bit_fetch: 2,
    bit_xix: 1,
    rot_xix: 3,
    rld: 3,
    mulub: 12,
    muluw: 34,
    nmi: 5,
    im1: 5,
    im2: 7,
    im0_extra: 1,
};

/// Points where the CPU variants diverge.
pub trait Personality {
    const KIND: CpuKind;
    const NAME: &'static str;
    /// Machine-default clock in Hz.
    const CLOCK_FREQ: u32;
    const TIMING: &'static Timing;
    /// `MULUB`/`MULUW` decode as instructions rather than ED holes.
    const HAS_MULTIPLY: bool;
}

/// Zilog Z80 at the MSX clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Z80Type;

impl Personality for Z80Type {
    const KIND: CpuKind = CpuKind::Z80;
    const NAME: &'static str = "z80";
    const CLOCK_FREQ: u32 = 3_579_545;
    const TIMING: &'static Timing = &Z80_TIMING;
    const HAS_MULTIPLY: bool = false;
}

/// ASCII R800 as found in the MSX turbo R.
#[derive(Debug, Clone, Copy, Default)]
pub struct R800Type;

impl Personality for R800Type {
    const KIND: CpuKind = CpuKind::R800;
    const NAME: &'static str = "r800";
    const CLOCK_FREQ: u32 = 7_159_090;
    const TIMING: &'static Timing = &R800_TIMING;
    const HAS_MULTIPLY: bool = true;
}
