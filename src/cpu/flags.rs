/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Cpu flags register bits definitions and flag helper methods.
use bitflags::bitflags;

bitflags! {
    /// Z80 Flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u8 {
        /// Sign Flag.
        const S  = 0b1000_0000;
        /// Zero Flag.
        const Z  = 0b0100_0000;
        /// Undocumented bit 5 of the Flag.
        const Y  = 0b0010_0000;
        /// Half Carry Flag.
        const H  = 0b0001_0000;
        /// Undocumented bit 3 of the Flag.
        const X  = 0b0000_1000;
        /// Parity/Overflow Flag.
        const PV = 0b0000_0100;
        /// Add/Subtract Flag.
        const N  = 0b0000_0010;
        /// Carry Flag.
        const C  = 0b0000_0001;
        /// An alias of [CpuFlags::PV].
        const P  = Self::PV.bits();
        /// An alias of [CpuFlags::PV].
        const V  = Self::PV.bits();
        /// A mask of both undocumented Flag's bits 3 and 5. [CpuFlags::X] | [CpuFlags::Y].
        const XY = Self::X.bits() | Self::Y.bits();
    }
}

impl Default for CpuFlags {
    fn default() -> Self {
        CpuFlags::empty()
    }
}

/// Half carry after an addition, indexed by the 3-bit lookup formed from bit 3 of
/// the operands and the result. See [hv_lookup].
pub const HALFCARRY_ADD: [CpuFlags; 8] = {
    const H: CpuFlags = CpuFlags::H;
    const O: CpuFlags = CpuFlags::empty();
    [O, H, H, H, O, O, O, H]
};
/// Half borrow after a subtraction, indexed like [HALFCARRY_ADD].
pub const HALFCARRY_SUB: [CpuFlags; 8] = {
    const H: CpuFlags = CpuFlags::H;
    const O: CpuFlags = CpuFlags::empty();
    [O, O, H, O, H, O, H, H]
};
/// Signed overflow after an addition, indexed by the 3-bit lookup formed from bit 7 of
/// the operands and the result. See [hv_lookup].
pub const OVERFLOW_ADD: [CpuFlags; 8] = {
    const V: CpuFlags = CpuFlags::V;
    const O: CpuFlags = CpuFlags::empty();
    [O, O, O, V, V, O, O, O]
};
/// Signed overflow after a subtraction, indexed like [OVERFLOW_ADD].
pub const OVERFLOW_SUB: [CpuFlags; 8] = {
    const V: CpuFlags = CpuFlags::V;
    const O: CpuFlags = CpuFlags::empty();
    [O, V, O, O, O, O, V, O]
};

/// Returns the combined index into the half carry (low 3 bits) and the overflow (bits 4 to 6) tables.
///
/// `a` is the first operand, `b` the second one and `r` the 8-bit result of the operation.
#[inline(always)]
pub const fn hv_lookup(a: u8, b: u8, r: u8) -> u8 {
    ((a & 0x88) >> 3) | ((b & 0x88) >> 2) | ((r & 0x88) >> 1)
}

/// The same as [hv_lookup] but for the 16-bit arithmetic, using bits 11 and 15.
#[inline(always)]
pub const fn hv_lookup16(a: u16, b: u16, r: u16) -> u8 {
    (((a & 0x8800) >> 11) | ((b & 0x8800) >> 10) | ((r & 0x8800) >> 9)) as u8
}

impl CpuFlags {
    /// Resets all [CpuFlags] to `false`.
    #[inline]
    pub fn reset(&mut self) {
        *self = CpuFlags::empty();
    }

    /// Returns a value of the Sign Flag.
    #[inline]
    pub fn sf(self) -> bool {
        self.contains(CpuFlags::S)
    }

    /// Returns a value of the Zero Flag.
    #[inline]
    pub fn zf(self) -> bool {
        self.contains(CpuFlags::Z)
    }

    /// Returns a value of the Half Carry Flag.
    #[inline]
    pub fn hf(self) -> bool {
        self.contains(CpuFlags::H)
    }

    /// Returns a value of the Parity/Overflow Flag.
    #[inline]
    pub fn pvf(self) -> bool {
        self.contains(CpuFlags::PV)
    }

    /// Returns a value of the Add/Subtract Flag.
    #[inline]
    pub fn nf(self) -> bool {
        self.contains(CpuFlags::N)
    }

    /// Returns a value of the Carry Flag.
    #[inline]
    pub fn cf(self) -> bool {
        self.contains(CpuFlags::C)
    }

    /// Returns the half carry flag after an addition of `a` and `b` giving `r`.
    #[inline]
    pub fn halfcarry_add(a: u8, b: u8, r: u8) -> Self {
        HALFCARRY_ADD[(hv_lookup(a, b, r) & 7) as usize]
    }

    /// Returns the half borrow flag after a subtraction of `b` from `a` giving `r`.
    #[inline]
    pub fn halfcarry_sub(a: u8, b: u8, r: u8) -> Self {
        HALFCARRY_SUB[(hv_lookup(a, b, r) & 7) as usize]
    }

    /// Returns the overflow flag after an addition of `a` and `b` giving `r`.
    #[inline]
    pub fn overflow_add(a: u8, b: u8, r: u8) -> Self {
        OVERFLOW_ADD[(hv_lookup(a, b, r) >> 4) as usize]
    }

    /// Returns the overflow flag after a subtraction of `b` from `a` giving `r`.
    #[inline]
    pub fn overflow_sub(a: u8, b: u8, r: u8) -> Self {
        OVERFLOW_SUB[(hv_lookup(a, b, r) >> 4) as usize]
    }

    /// Returns a new instance of [CpuFlags] with Flags
    /// [C][CpuFlags::C] | [V][CpuFlags::V] | [Z][CpuFlags::Z]
    /// where each Flag is set depending on the value being given in the arguments.
    #[inline]
    pub fn mask_cvz(cf: bool, vf: bool, zf: bool) -> Self {
        let mut bits = CpuFlags::empty();
        bits.set(CpuFlags::C, cf);
        bits.set(CpuFlags::V, vf);
        bits.set(CpuFlags::Z, zf);
        bits
    }

    /// Returns a new instance of [CpuFlags] with the [S][CpuFlags::S] Flag being set
    /// depending on the top-most bit of the given 8-bit unsigned value being set.
    #[inline]
    pub fn mask_sign(res: u8) -> Self {
        Self::from_bits_truncate(res & CpuFlags::S.bits())
    }

    /// Returns a new instance of [CpuFlags] with the [Z][CpuFlags::Z] Flag being set
    /// depending on the given value being equal to 0 (zero).
    #[inline]
    pub fn mask_zero(res: u8) -> Self {
        if res == 0 {
            CpuFlags::Z
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with the [C][CpuFlags::C] Flag being set
    /// depending on the given value.
    #[inline]
    pub fn mask_carry(cf: bool) -> Self {
        if cf {
            CpuFlags::C
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with the [N][CpuFlags::N] Flag being set
    /// depending on the given value.
    #[inline]
    pub fn mask_nf(nf: bool) -> Self {
        if nf {
            CpuFlags::N
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with the [H][CpuFlags::H] Flag being set
    /// depending on the given value.
    #[inline]
    pub fn mask_hf(hf: bool) -> Self {
        if hf {
            CpuFlags::H
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with Flags [C][CpuFlags::C] | [H][CpuFlags::H] being
    /// set depending on the given value.
    #[inline]
    pub fn mask_hcf(hcf: bool) -> Self {
        if hcf {
            CpuFlags::H|CpuFlags::C
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with the [PV][CpuFlags::PV] Flag being set
    /// depending on the given value.
    #[inline]
    pub fn mask_pvf(pvf: bool) -> Self {
        if pvf {
            CpuFlags::PV
        }
        else {
            CpuFlags::empty()
        }
    }

    /// Returns a new instance of [CpuFlags] with the [PV][CpuFlags::PV] Flag being set
    /// if the number of bits equal to 1 is even in the given value.
    #[inline]
    pub fn parity(res: u8) -> Self {
        Self::mask_pvf(res.count_ones() & 1 == 0)
    }

    /// Returns a new instance of [CpuFlags] with Flags [X][CpuFlags::X] | [Y][CpuFlags::Y]
    /// being set depending on the bit value 3 for `X` and 5 for `Y` in the given argument.
    #[inline]
    pub fn mask_xy(res: u8) -> Self {
        Self::from_bits_truncate(res & CpuFlags::XY.bits())
    }

    /// Returns a new instance of [CpuFlags] with Flags [S][CpuFlags::S] | [X][CpuFlags::X] | [Y][CpuFlags::Y]
    /// being set depending on the bit value 7 for `S`, 3 for `X` and 5 for `Y` in the given argument.
    #[inline]
    pub fn mask_sxy(res: u8) -> Self {
        Self::from_bits_truncate(res & (CpuFlags::S.bits()|CpuFlags::XY.bits()))
    }

    /// `S`, `Z`, `X`, `Y` and `P` from the result of a logical or a rotate operation.
    #[inline]
    pub(crate) fn mask_szxyp(res: u8) -> Self {
        Self::mask_sxy(res) | Self::mask_zero(res) | Self::parity(res)
    }

    #[inline]
    pub(crate) fn mask_bitops(res: u8, hf: bool, cf: bool) -> Self {
        let mut bits = Self::mask_szxyp(res);
        bits.set(CpuFlags::H, hf);
        bits.set(CpuFlags::C, cf);
        bits
    }

    /// Bit 1 of `n` goes to `Y` and bit 3 to `X`, as block transfers and compares do.
    #[inline]
    pub(crate) fn mask_block_op_xy(n: u8) -> Self {
        Self::from_bits_truncate(n & CpuFlags::X.bits() | n << 4 & CpuFlags::Y.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_work() {
        assert_eq!(0u8, CpuFlags::empty().bits());
        assert_eq!(0u8, CpuFlags::default().bits());
        assert!(!CpuFlags::empty().cf());
        let mut flags = CpuFlags::empty();
        flags.set(CpuFlags::C, true);
        assert!(flags.cf());
        flags.set(CpuFlags::C, false);
        assert!(!flags.cf());
        flags.set(CpuFlags::H, true);
        assert!(flags.hf());
        flags.set(CpuFlags::H, false);
        flags.set(CpuFlags::N, true);
        assert!(flags.nf());
        flags.set(CpuFlags::N, false);
        assert_eq!(0u8, flags.bits());
        flags = CpuFlags::all();
        assert_eq!(0xFFu8, flags.bits());
        flags.reset();
        assert_eq!(0u8, flags.bits());
        assert_eq!(CpuFlags::C|CpuFlags::V|CpuFlags::Z, CpuFlags::mask_cvz(true, true, true));
        assert_eq!(CpuFlags::V|CpuFlags::Z, CpuFlags::mask_cvz(false, true, true));
        assert_eq!(CpuFlags::empty(), CpuFlags::mask_cvz(false, false, false));
        assert_eq!(CpuFlags::empty(), CpuFlags::mask_xy(0));
        assert_eq!(CpuFlags::XY, CpuFlags::mask_xy(0b11111111));
        assert_eq!(CpuFlags::X, CpuFlags::mask_xy(0b00001000));
        assert_eq!(CpuFlags::Y, CpuFlags::mask_xy(0b11110111));
        assert_eq!(CpuFlags::S|CpuFlags::XY, CpuFlags::mask_sxy(0b11111111));
        assert_eq!(CpuFlags::S, CpuFlags::mask_sxy(0b11010111));
        for i in 0..=127 {
            assert_eq!(CpuFlags::empty(), CpuFlags::mask_sign(i));
        }
        for i in 128..=255 {
            assert_eq!(CpuFlags::S, CpuFlags::mask_sign(i));
        }
        for i in 1..=255 {
            assert_eq!(CpuFlags::empty(), CpuFlags::mask_zero(i));
        }
        assert_eq!(CpuFlags::Z, CpuFlags::mask_zero(0));
        assert_eq!(CpuFlags::H|CpuFlags::C, CpuFlags::mask_hcf(true));
        assert_eq!(CpuFlags::empty(), CpuFlags::parity(1));
        assert_eq!(CpuFlags::empty(), CpuFlags::parity(254));
        assert_eq!(CpuFlags::PV, CpuFlags::parity(0));
        assert_eq!(CpuFlags::PV, CpuFlags::parity(255));
        assert_eq!(CpuFlags::Z|CpuFlags::P, CpuFlags::mask_bitops(0, false, false));
        assert_eq!(CpuFlags::Z|CpuFlags::P|CpuFlags::H|CpuFlags::C, CpuFlags::mask_bitops(0, true, true));
        assert_eq!(CpuFlags::S|CpuFlags::XY|CpuFlags::H|CpuFlags::C, CpuFlags::mask_bitops(0b10101000, true, true));
        assert_eq!(CpuFlags::Y, CpuFlags::mask_block_op_xy(0b0000_0010));
        assert_eq!(CpuFlags::X, CpuFlags::mask_block_op_xy(0b0000_1000));
    }

    #[test]
    fn hv_tables_work() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let r = a.wrapping_add(b);
                let h = (a & 0x0F) + (b & 0x0F) > 0x0F;
                let v = (a as i8).checked_add(b as i8).is_none();
                assert_eq!(h, CpuFlags::halfcarry_add(a, b, r).hf());
                assert_eq!(v, CpuFlags::overflow_add(a, b, r).pvf());
                let r = a.wrapping_sub(b);
                let h = (a & 0x0F) < (b & 0x0F);
                let v = (a as i8).checked_sub(b as i8).is_none();
                assert_eq!(h, CpuFlags::halfcarry_sub(a, b, r).hf());
                assert_eq!(v, CpuFlags::overflow_sub(a, b, r).pvf());
            }
        }
    }

    #[test]
    fn hv_lookup16_works() {
        assert_eq!(hv_lookup(0x08, 0x08, 0x10), hv_lookup16(0x0800, 0x0800, 0x1000));
        assert_eq!(hv_lookup(0x80, 0x88, 0x08), hv_lookup16(0x8000, 0x8800, 0x0800));
    }
}
