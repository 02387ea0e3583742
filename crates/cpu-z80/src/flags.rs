//! Bits of the F register and the helpers that derive them from a result.

/// S: bit 7 of the result.
pub const SF: u8 = 0x80;
/// Z: result was zero.
pub const ZF: u8 = 0x40;
/// Y: undocumented, usually bit 5 of the result.
pub const YF: u8 = 0x20;
/// H: carry or borrow between the nibbles.
pub const HF: u8 = 0x10;
/// X: undocumented, usually bit 3 of the result.
pub const XF: u8 = 0x08;
/// P/V: even parity, signed overflow, or BC != 0 after block transfers.
pub const PF: u8 = 0x04;
/// N: last ALU operation was a subtraction.
pub const NF: u8 = 0x02;
/// C: carry out of bit 7 (bit 15 for 16-bit adds).
pub const CF: u8 = 0x01;

/// True if `value` has an even number of set bits.
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones().is_multiple_of(2)
}

/// S, Z and the undocumented X/Y bits for `value`.
#[must_use]
pub const fn sz53(value: u8) -> u8 {
    let mut f = value & (SF | YF | XF);
    if value == 0 {
        f |= ZF;
    }
    f
}

/// [`sz53`] plus the parity bit.
#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    let mut f = sz53(value);
    if parity(value) {
        f |= PF;
    }
    f
}
