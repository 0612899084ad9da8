/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Arithmetic, logic, bit and block operations.
//!
//! All Flags involved instructions uses these methods to alter Flags state.
//! Half carry and overflow of the additions and subtractions come from the lookup tables in [crate::cpu].
use crate::cpu::{hv_lookup, hv_lookup16, CpuFlags, Ops8, Rot,
                 HALFCARRY_ADD, HALFCARRY_SUB, OVERFLOW_ADD, OVERFLOW_SUB};

#[inline]
fn add_flags(a: u8, b: u8, res: u16) -> CpuFlags {
    let r = res as u8;
    let lookup = hv_lookup(a, b, r);
    CpuFlags::mask_sxy(r) |
    CpuFlags::mask_zero(r) |
    CpuFlags::mask_carry(res & 0x100 != 0) |
    HALFCARRY_ADD[(lookup & 7) as usize] |
    OVERFLOW_ADD[(lookup >> 4) as usize]
}

#[inline]
fn sub_flags(a: u8, b: u8, res: u16) -> CpuFlags {
    let r = res as u8;
    let lookup = hv_lookup(a, b, r);
    CpuFlags::N |
    CpuFlags::mask_sxy(r) |
    CpuFlags::mask_zero(r) |
    CpuFlags::mask_carry(res & 0x100 != 0) |
    HALFCARRY_SUB[(lookup & 7) as usize] |
    OVERFLOW_SUB[(lookup >> 4) as usize]
}

#[inline]
pub fn add(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = a as u16 + b as u16;
    *flags = add_flags(a, b, res);
    res as u8
}

#[inline]
pub fn adc(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = a as u16 + b as u16 + flags.cf() as u16;
    *flags = add_flags(a, b, res);
    res as u8
}

#[inline]
pub fn sub(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = (a as u16).wrapping_sub(b as u16);
    *flags = sub_flags(a, b, res);
    res as u8
}

#[inline]
pub fn sbc(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = (a as u16).wrapping_sub(b as u16).wrapping_sub(flags.cf() as u16);
    *flags = sub_flags(a, b, res);
    res as u8
}

/// Like [sub] but bits 3 and 5 of the Flags are taken from the operand.
#[inline]
pub fn cp(a: u8, b: u8, flags: &mut CpuFlags) {
    let res = (a as u16).wrapping_sub(b as u16);
    *flags = sub_flags(a, b, res) - CpuFlags::XY | CpuFlags::mask_xy(b);
}

#[inline]
pub fn neg(acc: u8, flags: &mut CpuFlags) -> u8 {
    sub(0, acc, flags)
}

#[inline]
pub fn and(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = a & b;
    *flags = CpuFlags::mask_bitops(res, true, false);
    res
}

#[inline]
pub fn xor(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = a ^ b;
    *flags = CpuFlags::mask_szxyp(res);
    res
}

#[inline]
pub fn or(a: u8, b: u8, flags: &mut CpuFlags) -> u8 {
    let res = a | b;
    *flags = CpuFlags::mask_szxyp(res);
    res
}

/// Applies one of the 8-bit arithmetic or logic operations to the Accumulator.
///
/// Returns the new value of the Accumulator, which for `CP` is `acc` itself.
#[inline]
pub fn alu8(op: Ops8, acc: u8, val: u8, flags: &mut CpuFlags) -> u8 {
    match op {
        Ops8::ADD => add(acc, val, flags),
        Ops8::ADC => adc(acc, val, flags),
        Ops8::SUB => sub(acc, val, flags),
        Ops8::SBC => sbc(acc, val, flags),
        Ops8::AND => and(acc, val, flags),
        Ops8::XOR => xor(acc, val, flags),
        Ops8::OR  => or(acc, val, flags),
        Ops8::CP  => { cp(acc, val, flags); acc }
    }
}

#[inline]
pub fn inc(val: u8, flags: &mut CpuFlags) -> u8 {
    let res = val.wrapping_add(1);
    *flags = (*flags & CpuFlags::C) |
             CpuFlags::mask_sxy(res) |
             CpuFlags::mask_zero(res) |
             CpuFlags::mask_hf(val & 0x0F == 0x0F) |
             CpuFlags::mask_pvf(val == 0x7F);
    res
}

#[inline]
pub fn dec(val: u8, flags: &mut CpuFlags) -> u8 {
    let res = val.wrapping_sub(1);
    *flags = (*flags & CpuFlags::C) |
             CpuFlags::N |
             CpuFlags::mask_sxy(res) |
             CpuFlags::mask_zero(res) |
             CpuFlags::mask_hf(val & 0x0F == 0) |
             CpuFlags::mask_pvf(val == 0x80);
    res
}

/// `ADD HL,rr`: `S`, `Z` and `P/V` are left untouched.
#[inline]
pub fn add16(a: u16, b: u16, flags: &mut CpuFlags) -> u16 {
    let res = a as u32 + b as u32;
    let r = res as u16;
    let lookup = hv_lookup16(a, b, r);
    *flags = (*flags & (CpuFlags::S|CpuFlags::Z|CpuFlags::PV)) |
             CpuFlags::mask_xy((r >> 8) as u8) |
             CpuFlags::mask_carry(res & 0x1_0000 != 0) |
             HALFCARRY_ADD[(lookup & 7) as usize];
    r
}

#[inline]
pub fn adc16(a: u16, b: u16, flags: &mut CpuFlags) -> u16 {
    let res = a as u32 + b as u32 + flags.cf() as u32;
    let r = res as u16;
    let lookup = hv_lookup16(a, b, r);
    *flags = CpuFlags::mask_sxy((r >> 8) as u8) |
             CpuFlags::mask_zero((r | r >> 8) as u8) |
             CpuFlags::mask_carry(res & 0x1_0000 != 0) |
             HALFCARRY_ADD[(lookup & 7) as usize] |
             OVERFLOW_ADD[(lookup >> 4) as usize];
    r
}

#[inline]
pub fn sbc16(a: u16, b: u16, flags: &mut CpuFlags) -> u16 {
    let res = (a as u32).wrapping_sub(b as u32).wrapping_sub(flags.cf() as u32);
    let r = res as u16;
    let lookup = hv_lookup16(a, b, r);
    *flags = CpuFlags::N |
             CpuFlags::mask_sxy((r >> 8) as u8) |
             CpuFlags::mask_zero((r | r >> 8) as u8) |
             CpuFlags::mask_carry(res & 0x1_0000 != 0) |
             HALFCARRY_SUB[(lookup & 7) as usize] |
             OVERFLOW_SUB[(lookup >> 4) as usize];
    r
}

#[inline]
pub fn cpl(acc: u8, flags: &mut CpuFlags) -> u8 {
    let res = !acc;
    *flags = (*flags - CpuFlags::XY) | CpuFlags::mask_xy(res) | CpuFlags::H | CpuFlags::N;
    res
}

#[inline]
pub fn ccf(q: u8, flags: &mut CpuFlags) {
    let cf = flags.cf();
    *flags = (*flags & (CpuFlags::S|CpuFlags::Z|CpuFlags::PV)) |
             CpuFlags::mask_xy(q) |
             CpuFlags::mask_hf(cf) |
             CpuFlags::mask_carry(!cf);
}

#[inline]
pub fn scf(q: u8, flags: &mut CpuFlags) {
    *flags = (*flags & (CpuFlags::S|CpuFlags::Z|CpuFlags::PV)) |
             CpuFlags::mask_xy(q) |
             CpuFlags::C;
}

#[inline]
pub fn daa(acc: u8, flags: &mut CpuFlags) -> u8 {
    let (cf0, hf0, nf0) = (flags.cf(), flags.hf(), flags.nf());
    let low_nibble = acc & 0x0F;
    let mut diff = 0;
    if hf0 || low_nibble > 9 {
        diff |= 0x06;
    }
    let cf = cf0 || acc > 0x99;
    if cf {
        diff |= 0x60;
    }
    let (res, hf) = if nf0 {
        (acc.wrapping_sub(diff), hf0 && low_nibble < 6)
    }
    else {
        (acc.wrapping_add(diff), low_nibble > 9)
    };
    *flags = CpuFlags::mask_bitops(res, hf, cf) | CpuFlags::mask_nf(nf0);
    res
}

/// Flags after the accumulator only rotations: `S`, `Z` and `P/V` are left untouched.
#[inline]
fn rot_acc_flags(res: u8, cf: bool, flags: &mut CpuFlags) {
    *flags = (*flags & (CpuFlags::S|CpuFlags::Z|CpuFlags::PV)) |
             CpuFlags::mask_xy(res) |
             CpuFlags::mask_carry(cf);
}

#[inline]
pub fn rlca(acc: u8, flags: &mut CpuFlags) -> u8 {
    let res = acc.rotate_left(1);
    rot_acc_flags(res, res & 1 != 0, flags);
    res
}

#[inline]
pub fn rrca(acc: u8, flags: &mut CpuFlags) -> u8 {
    let res = acc.rotate_right(1);
    rot_acc_flags(res, acc & 1 != 0, flags);
    res
}

#[inline]
pub fn rla(acc: u8, flags: &mut CpuFlags) -> u8 {
    let res = acc << 1 | flags.cf() as u8;
    rot_acc_flags(res, acc & 0x80 != 0, flags);
    res
}

#[inline]
pub fn rra(acc: u8, flags: &mut CpuFlags) -> u8 {
    let res = acc >> 1 | (flags.cf() as u8) << 7;
    rot_acc_flags(res, acc & 1 != 0, flags);
    res
}

/// Applies one of the `0xCB` group shift or rotate operations.
#[inline]
pub fn rot(op: Rot, val: u8, flags: &mut CpuFlags) -> u8 {
    let c0 = flags.cf() as u8;
    let (res, cf) = match op {
        Rot::RLC => (val.rotate_left(1), val & 0x80 != 0),
        Rot::RRC => (val.rotate_right(1), val & 1 != 0),
        Rot::RL  => (val << 1 | c0, val & 0x80 != 0),
        Rot::RR  => (val >> 1 | c0 << 7, val & 1 != 0),
        Rot::SLA => (val << 1, val & 0x80 != 0),
        Rot::SRA => (val >> 1 | val & 0x80, val & 1 != 0),
        Rot::SLL => (val << 1 | 1, val & 0x80 != 0),
        Rot::SRL => (val >> 1, val & 1 != 0),
    };
    *flags = CpuFlags::mask_bitops(res, false, cf);
    res
}

/// Returns `(new accumulator, new memory value)`.
#[inline]
pub fn rld(acc: u8, mem: u8, flags: &mut CpuFlags) -> (u8, u8) {
    let res_acc = (acc & 0xF0) | (mem >> 4);
    let res_mem = (mem << 4) | (acc & 0x0F);
    *flags = CpuFlags::mask_bitops(res_acc, false, flags.cf());
    (res_acc, res_mem)
}

/// Returns `(new accumulator, new memory value)`.
#[inline]
pub fn rrd(acc: u8, mem: u8, flags: &mut CpuFlags) -> (u8, u8) {
    let res_acc = (acc & 0xF0) | (mem & 0x0F);
    let res_mem = (acc << 4) | (mem >> 4);
    *flags = CpuFlags::mask_bitops(res_acc, false, flags.cf());
    (res_acc, res_mem)
}

/// `BIT n,val`. Bits 3 and 5 of the Flags are copied from `xy_src`.
///
/// That is `val` for registers, the high byte of MEMPTR for `(HL)` and the high byte
/// of the address for `(IX+d)`.
#[inline]
pub fn bit(n: u8, val: u8, xy_src: u8, flags: &mut CpuFlags) {
    let res = val & (1 << (n & 7));
    *flags = CpuFlags::H |
             (*flags & CpuFlags::C) |
             CpuFlags::mask_sign(res) |
             CpuFlags::mask_xy(xy_src) |
             if res == 0 { CpuFlags::Z|CpuFlags::P } else { CpuFlags::empty() };
}

#[inline]
pub fn res(n: u8, v: u8) -> u8 { !(1 << (n & 7)) & v }

#[inline]
pub fn set(n: u8, v: u8) -> u8 { (1 << (n & 7)) | v }

#[inline]
pub fn ld_a_ir(ir: u8, iff2: bool, flags: &mut CpuFlags) {
    *flags = CpuFlags::mask_sxy(ir) |
             CpuFlags::mask_zero(ir) |
             CpuFlags::mask_pvf(iff2) |
             (*flags & CpuFlags::C);
}

/// `IN r,(C)`.
#[inline]
pub fn io(val: u8, flags: &mut CpuFlags) {
    *flags = CpuFlags::mask_szxyp(val) | (*flags & CpuFlags::C);
}

/// `LDI`, `LDD`, `LDIR` and `LDDR`.
#[inline]
pub fn ldx(acc: u8, val: u8, bc_is_zero: bool, flags: &mut CpuFlags) {
    let n = val.wrapping_add(acc);
    *flags = (*flags & (CpuFlags::S|CpuFlags::Z|CpuFlags::C)) |
             CpuFlags::mask_block_op_xy(n) |
             CpuFlags::mask_pvf(!bc_is_zero);
}

/// `CPI`, `CPD`, `CPIR` and `CPDR`.
///
/// Returns `true` if the repeating variant should stop.
#[inline]
pub fn cpx(acc: u8, val: u8, bc_is_zero: bool, flags: &mut CpuFlags) -> bool {
    let res = acc.wrapping_sub(val);
    let bits = CpuFlags::N |
               CpuFlags::halfcarry_sub(acc, val, res) |
               CpuFlags::mask_sign(res) |
               CpuFlags::mask_zero(res) |
               CpuFlags::mask_pvf(!bc_is_zero);
    let n = res.wrapping_sub(bits.hf() as u8);
    *flags = bits |
             CpuFlags::mask_block_op_xy(n) |
             (*flags & CpuFlags::C);
    bc_is_zero || res == 0
}

/// `INI`, `IND`, `OUTI`, `OUTD` and the repeating variants.
///
/// * `S`, `Z`, `Y` and `X` are taken from `b`, the value of `B` after the decrement.
/// * `N` is a copy of bit 7 of the transferred value.
/// * `H` and `C` are both set if `io + m > 255`.
/// * `P/V` is the parity of `((io + m) & 7) ^ b`.
#[inline]
pub fn iox(io: u8, b: u8, m: u8, flags: &mut CpuFlags) {
    let (k, hcf) = io.overflowing_add(m);
    *flags = CpuFlags::mask_sxy(b) |
             CpuFlags::mask_zero(b) |
             CpuFlags::mask_nf(io & 0x80 != 0) |
             CpuFlags::mask_hcf(hcf) |
             CpuFlags::parity(k & 7 ^ b);
}
