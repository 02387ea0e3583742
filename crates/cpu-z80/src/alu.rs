//! ALU operations.

#![allow(clippy::verbose_bit_mask)] // Clearer to read mask comparisons.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};
use crate::opcodes::{AluOp, RotOp};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add two bytes with optional carry.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let value = wide as u8;

    let mut flags = sz53(value);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    // Both operands same sign, result different sign.
    if (a ^ b) & 0x80 == 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// Subtract with optional borrow.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = sz53(value) | NF;
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (b ^ value) & 0x80 == 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }
    AluResult { value, flags }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult { value, flags: sz53p(value) | HF }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult { value, flags: sz53p(value) }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult { value, flags: sz53p(value) }
}

/// Compare. The accumulator is returned unchanged; X/Y come from the
/// operand rather than the difference.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let diff = sub8(a, b, false);
    AluResult {
        value: a,
        flags: (diff.flags & !(YF | XF)) | (b & (YF | XF)),
    }
}

/// Dispatch one of the eight accumulator operations.
#[must_use]
pub fn alu8(op: AluOp, a: u8, b: u8, flags: u8) -> AluResult {
    let carry = flags & CF != 0;
    match op {
        AluOp::Add => add8(a, b, false),
        AluOp::Adc => add8(a, b, carry),
        AluOp::Sub => sub8(a, b, false),
        AluOp::Sbc => sub8(a, b, carry),
        AluOp::And => and8(a, b),
        AluOp::Xor => xor8(a, b),
        AluOp::Or => or8(a, b),
        AluOp::Cp => cp8(a, b),
    }
}

/// Increment. Carry is preserved from `flags`.
#[must_use]
pub fn inc8(a: u8, flags: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let mut f = sz53(value) | (flags & CF);
    if a & 0x0F == 0x0F {
        f |= HF;
    }
    if a == 0x7F {
        f |= PF;
    }
    AluResult { value, flags: f }
}

/// Decrement. Carry is preserved from `flags`.
#[must_use]
pub fn dec8(a: u8, flags: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let mut f = sz53(value) | NF | (flags & CF);
    if a & 0x0F == 0x00 {
        f |= HF;
    }
    if a == 0x80 {
        f |= PF;
    }
    AluResult { value, flags: f }
}

/// CB-space rotate or shift.
#[must_use]
pub fn rotate(op: RotOp, a: u8, flags: u8) -> AluResult {
    let carry_in = flags & CF;
    let (value, carry_out) = match op {
        RotOp::Rlc => (a.rotate_left(1), a >> 7),
        RotOp::Rrc => (a.rotate_right(1), a & 1),
        RotOp::Rl => ((a << 1) | carry_in, a >> 7),
        RotOp::Rr => ((a >> 1) | (carry_in << 7), a & 1),
        RotOp::Sla => (a << 1, a >> 7),
        RotOp::Sra => ((a >> 1) | (a & 0x80), a & 1),
        RotOp::Sll => ((a << 1) | 1, a >> 7),
        RotOp::Srl => (a >> 1, a & 1),
    };
    AluResult {
        value,
        flags: sz53p(value) | carry_out,
    }
}

/// Accumulator rotates (`RLCA`, `RRCA`, `RLA`, `RRA`).
///
/// Unlike the CB forms these keep S, Z and P/V.
#[must_use]
pub fn rotate_a(op: RotOp, a: u8, flags: u8) -> AluResult {
    let r = rotate(op, a, flags);
    AluResult {
        value: r.value,
        flags: (flags & (SF | ZF | PF)) | (r.value & (YF | XF)) | (r.flags & CF),
    }
}

/// Decimal adjust after addition or subtraction.
#[must_use]
pub fn daa(a: u8, flags: u8) -> AluResult {
    let mut correction = 0u8;
    let mut carry = flags & CF;
    if flags & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry != 0 || a > 0x99 {
        correction |= 0x60;
        carry = CF;
    }
    let subtract = flags & NF != 0;
    let value = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        flags & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut f = sz53p(value) | (flags & NF) | carry;
    if half {
        f |= HF;
    }
    AluResult { value, flags: f }
}

/// 16-bit add for HL/IX/IY. S, Z and P/V are preserved from `flags`.
#[must_use]
pub fn add16(a: u16, b: u16, flags: u8) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let value = wide as u16;

    let mut f = (flags & (SF | ZF | PF)) | ((value >> 8) as u8 & (YF | XF));
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        f |= HF;
    }
    if wide > 0xFFFF {
        f |= CF;
    }
    (value, f)
}

/// 16-bit add with carry for HL.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let wide = u32::from(a) + u32::from(b) + u32::from(c);
    let value = wide as u16;

    let mut f = (value >> 8) as u8 & (SF | YF | XF);
    if value == 0 {
        f |= ZF;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        f |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ value) & 0x8000 != 0 {
        f |= PF;
    }
    if wide > 0xFFFF {
        f |= CF;
    }
    (value, f)
}

/// 16-bit subtract with borrow for HL.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);

    let mut f = NF | ((value >> 8) as u8 & (SF | YF | XF));
    if value == 0 {
        f |= ZF;
    }
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        f |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (b ^ value) & 0x8000 == 0 {
        f |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        f |= CF;
    }
    (value, f)
}

/// R800 `MULUB`: unsigned 8x8 multiply into a 16-bit product.
///
/// Z is set for a zero product, C when the product needs more than 8 bits.
/// N, H, X and Y are preserved; S and P/V are cleared.
#[must_use]
pub fn mulub(a: u8, b: u8, flags: u8) -> (u16, u8) {
    let product = u16::from(a) * u16::from(b);
    let mut f = flags & (NF | HF | XF | YF);
    if product == 0 {
        f |= ZF;
    }
    if product > 0xFF {
        f |= CF;
    }
    (product, f)
}

/// R800 `MULUW`: unsigned 16x16 multiply into a 32-bit product.
#[must_use]
pub fn muluw(a: u16, b: u16, flags: u8) -> (u32, u8) {
    let product = u32::from(a) * u32::from(b);
    let mut f = flags & (NF | HF | XF | YF);
    if product == 0 {
        f |= ZF;
    }
    if product > 0xFFFF {
        f |= CF;
    }
    (product, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overflow_and_half_carry() {
        let r = add8(0x7F, 0x01, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags & (SF | HF | PF | CF), SF | HF | PF);

        let r = add8(0xFF, 0x01, false);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & (ZF | CF | HF), ZF | CF | HF);
    }

    #[test]
    fn sub_with_borrow() {
        let r = sub8(0x00, 0x00, true);
        assert_eq!(r.value, 0xFF);
        assert_eq!(r.flags & (CF | NF | HF), CF | NF | HF);
    }

    #[test]
    fn compare_takes_xy_from_operand() {
        let r = cp8(0x00, 0x28);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & (YF | XF), YF | XF);
    }

    #[test]
    fn inc_keeps_carry() {
        assert_eq!(inc8(0x7F, CF).flags, SF | HF | PF | CF);
        assert_eq!(dec8(0x01, 0).flags, ZF | NF);
    }

    #[test]
    fn sll_sets_bit_zero() {
        let r = rotate(RotOp::Sll, 0x80, 0);
        assert_eq!(r.value, 0x01);
        assert_eq!(r.flags & CF, CF);
    }

    #[test]
    fn rra_keeps_sign_zero_parity() {
        let r = rotate_a(RotOp::Rr, 0x01, ZF | SF);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags, ZF | SF | CF);
    }

    #[test]
    fn daa_after_bcd_add() {
        // 0x15 + 0x27 = 0x3C, adjusted to 0x42.
        let sum = add8(0x15, 0x27, false);
        assert_eq!(daa(sum.value, sum.flags).value, 0x42);
        // 0x99 + 0x01 wraps to 0x00 with carry.
        let sum = add8(0x99, 0x01, false);
        let r = daa(sum.value, sum.flags);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & CF, CF);
    }

    #[test]
    fn sbc16_zero_result() {
        let (v, f) = sbc16(0x1000, 0x0FFF, true);
        assert_eq!(v, 0);
        assert_eq!(f & (ZF | NF | CF), ZF | NF);
    }

    #[test]
    fn multiply_flags() {
        assert_eq!(mulub(0x10, 0x10, 0), (0x0100, CF));
        assert_eq!(mulub(0x00, 0x55, HF), (0x0000, ZF | HF));
        assert_eq!(muluw(0x0100, 0x0100, 0), (0x0001_0000, CF));
        assert_eq!(muluw(0x0002, 0x0003, SF), (6, 0));
    }
}
