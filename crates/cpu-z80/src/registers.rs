//! Z80 register set.

use serde::{Deserialize, Serialize};

use crate::flags::{CF, HF, NF, PF, SF, ZF};
use crate::opcodes::{Cond, R8, R16};

/// Z80 registers.
///
/// The alternate bank lives beside the active one; `EX AF,AF'` and `EXX`
/// swap the two in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    // Main registers
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    // Alternate registers
    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    // Index registers
    pub ix: u16,
    pub iy: u16,

    // Other registers
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,

    /// WZ/MEMPTR - internal temporary register.
    /// Affects undocumented X/Y flags in BIT instructions.
    pub wz: u16,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,

    pub halted: bool,
}

impl Registers {
    /// Power-on state: everything zero except AF and SP.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f as u16
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_af(&mut self, value: u16) {
        self.a = (value >> 8) as u8;
        self.f = value as u8;
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    /// Alternate AF'.
    #[must_use]
    pub const fn af_alt(&self) -> u16 {
        (self.a_alt as u16) << 8 | self.f_alt as u16
    }

    /// Alternate BC'.
    #[must_use]
    pub const fn bc_alt(&self) -> u16 {
        (self.b_alt as u16) << 8 | self.c_alt as u16
    }

    /// Alternate DE'.
    #[must_use]
    pub const fn de_alt(&self) -> u16 {
        (self.d_alt as u16) << 8 | self.e_alt as u16
    }

    /// Alternate HL'.
    #[must_use]
    pub const fn hl_alt(&self) -> u16 {
        (self.h_alt as u16) << 8 | self.l_alt as u16
    }

    /// `EX AF,AF'`.
    pub fn ex_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_alt);
        std::mem::swap(&mut self.f, &mut self.f_alt);
    }

    /// `EXX`: swap BC, DE and HL with the alternate bank.
    pub fn exx(&mut self) {
        std::mem::swap(&mut self.b, &mut self.b_alt);
        std::mem::swap(&mut self.c, &mut self.c_alt);
        std::mem::swap(&mut self.d, &mut self.d_alt);
        std::mem::swap(&mut self.e, &mut self.e_alt);
        std::mem::swap(&mut self.h, &mut self.h_alt);
        std::mem::swap(&mut self.l, &mut self.l_alt);
    }

    /// `EX DE,HL`.
    pub fn ex_de_hl(&mut self) {
        std::mem::swap(&mut self.d, &mut self.h);
        std::mem::swap(&mut self.e, &mut self.l);
    }

    #[must_use]
    pub fn get8(&self, r: R8) -> u8 {
        match r {
            R8::B => self.b,
            R8::C => self.c,
            R8::D => self.d,
            R8::E => self.e,
            R8::H => self.h,
            R8::L => self.l,
            R8::A => self.a,
            R8::Ixh => (self.ix >> 8) as u8,
            R8::Ixl => self.ix as u8,
            R8::Iyh => (self.iy >> 8) as u8,
            R8::Iyl => self.iy as u8,
        }
    }

    pub fn set8(&mut self, r: R8, value: u8) {
        match r {
            R8::B => self.b = value,
            R8::C => self.c = value,
            R8::D => self.d = value,
            R8::E => self.e = value,
            R8::H => self.h = value,
            R8::L => self.l = value,
            R8::A => self.a = value,
            R8::Ixh => self.ix = (self.ix & 0x00FF) | u16::from(value) << 8,
            R8::Ixl => self.ix = (self.ix & 0xFF00) | u16::from(value),
            R8::Iyh => self.iy = (self.iy & 0x00FF) | u16::from(value) << 8,
            R8::Iyl => self.iy = (self.iy & 0xFF00) | u16::from(value),
        }
    }

    #[must_use]
    pub fn get16(&self, rr: R16) -> u16 {
        match rr {
            R16::Bc => self.bc(),
            R16::De => self.de(),
            R16::Hl => self.hl(),
            R16::Sp => self.sp,
            R16::Af => self.af(),
            R16::Ix => self.ix,
            R16::Iy => self.iy,
        }
    }

    pub fn set16(&mut self, rr: R16, value: u16) {
        match rr {
            R16::Bc => self.set_bc(value),
            R16::De => self.set_de(value),
            R16::Hl => self.set_hl(value),
            R16::Sp => self.sp = value,
            R16::Af => self.set_af(value),
            R16::Ix => self.ix = value,
            R16::Iy => self.iy = value,
        }
    }

    /// Advance the refresh counter. Bit 7 is preserved.
    pub fn inc_r(&mut self, count: u8) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(count) & 0x7F);
    }

    #[must_use]
    pub const fn carry(&self) -> bool {
        self.f & CF != 0
    }

    #[must_use]
    pub const fn zero(&self) -> bool {
        self.f & ZF != 0
    }

    #[must_use]
    pub const fn sign(&self) -> bool {
        self.f & SF != 0
    }

    #[must_use]
    pub const fn parity_overflow(&self) -> bool {
        self.f & PF != 0
    }

    #[must_use]
    pub const fn half_carry(&self) -> bool {
        self.f & HF != 0
    }

    #[must_use]
    pub const fn subtract(&self) -> bool {
        self.f & NF != 0
    }

    /// Evaluate a branch condition against F.
    #[must_use]
    pub const fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::Nz => !self.zero(),
            Cond::Z => self.zero(),
            Cond::Nc => !self.carry(),
            Cond::C => self.carry(),
            Cond::Po => !self.parity_overflow(),
            Cond::Pe => self.parity_overflow(),
            Cond::P => !self.sign(),
            Cond::M => self.sign(),
        }
    }
}
