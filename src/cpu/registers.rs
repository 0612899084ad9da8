/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module contains cpu registers related building blocks.
use core::fmt;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize, Serializer, de::{
                                            self, Deserializer, Visitor, SeqAccess}};
use super::{CpuFlags, Prefix, Reg16, Reg8, StkReg16};

/// The interrupt mode enum.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy,Clone,PartialEq,Eq,Hash,Debug,Default)]
#[repr(u8)]
pub enum InterruptMode {
    #[default]
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
}

impl core::convert::TryFrom<u8> for InterruptMode {
    type Error = ();

    #[inline(always)]
    fn try_from(im: u8) -> Result<Self, Self::Error> {
        match im {
            0 => Ok(InterruptMode::Mode0),
            1 => Ok(InterruptMode::Mode1),
            2 => Ok(InterruptMode::Mode2),
            _ => Err(())
        }
    }
}

/// A struct that represents a register pair, that can be treated as a single 16-bit
/// register or a separate 8-bit (MSB/LSB) registers.
#[derive(Clone,Copy,PartialEq,Eq,Default,Hash,Debug)]
pub struct RegisterPair([u8;2]);

impl RegisterPair {
    #[inline]
    pub fn get16(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    #[inline]
    pub fn set16(&mut self, val: u16) {
        self.0 = val.to_le_bytes();
    }

    #[inline]
    pub fn get8hi(self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn get8lo(self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn set8hi(&mut self, val: u8) {
        self.0[1] = val;
    }

    #[inline]
    pub fn set8lo(&mut self, val: u8) {
        self.0[0] = val;
    }

    /// Returns `(hi, lo)`.
    #[inline]
    pub fn get(self) -> (u8, u8) {
        let [lo, hi] = self.0;
        (hi, lo)
    }

    #[inline]
    pub fn set(&mut self, hi: u8, lo: u8) {
        self.0 = [lo, hi];
    }

    #[inline]
    pub fn inc16(&mut self) {
        self.set16(self.get16().wrapping_add(1));
    }

    #[inline]
    pub fn add16(&mut self, val: u16) {
        self.set16(self.get16().wrapping_add(val));
    }

    #[inline]
    pub fn dec16(&mut self) {
        self.set16(self.get16().wrapping_sub(1));
    }

    /// Subtracts 1 from the 16-bit register and returns true if the result is 0.
    #[inline]
    pub fn dec16_is_zero(&mut self) -> bool {
        let val = self.get16().wrapping_sub(1);
        self.set16(val);
        val == 0
    }

    /// Applies op to the 8-bit high half value and modifies it in place.
    #[inline]
    pub fn op8hi<F: FnOnce(u8) -> u8>(&mut self, op: F) {
        self.0[1] = op(self.0[1]);
    }

    /// Applies op to the 8-bit low half value and modifies it in place.
    #[inline]
    pub fn op8lo<F: FnOnce(u8) -> u8>(&mut self, op: F) {
        self.0[0] = op(self.0[0]);
    }
}

impl From<u16> for RegisterPair {
    fn from(uint: u16) -> Self {
        RegisterPair(uint.to_le_bytes())
    }
}

impl From<i16> for RegisterPair {
    fn from(int: i16) -> Self {
        RegisterPair(int.to_le_bytes())
    }
}

impl From<[u8;2]> for RegisterPair {
    fn from(pair: [u8;2]) -> Self {
        RegisterPair(pair)
    }
}

impl fmt::UpperHex for RegisterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.get16(), f)
    }
}

/// The complete programmer visible state of the Z80.
///
/// Besides the registers this includes the interrupt flip-flops, the interrupt mode
/// and the `HALT` state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone,Copy,Default,PartialEq,Eq,Debug)]
pub struct RegisterSet {
    pub(crate) af: RegisterPair,
    pub(crate) bc: RegisterPair,
    pub(crate) de: RegisterPair,
    pub(crate) hl: RegisterPair,
    pub(crate) af_alt: RegisterPair,
    pub(crate) bc_alt: RegisterPair,
    pub(crate) de_alt: RegisterPair,
    pub(crate) hl_alt: RegisterPair,
    pub(crate) ix: RegisterPair,
    pub(crate) iy: RegisterPair,
    pub(crate) sp: RegisterPair,
    pub(crate) pc: RegisterPair,
    pub(crate) memptr: RegisterPair,
    pub(crate) i: u8,
    pub(crate) r: u8,
    pub(crate) iff1: bool,
    pub(crate) iff2: bool,
    pub(crate) im: InterruptMode,
    pub(crate) halted: bool,
}

macro_rules! reg8_accessors {
    ($($get:ident, $set:ident => $pair:ident.$hilo_get:ident / $hilo_set:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> u8 {
                self.$pair.$hilo_get()
            }

            #[inline]
            pub fn $set(&mut self, val: u8) {
                self.$pair.$hilo_set(val)
            }
        )*
    };
}

macro_rules! reg16_accessors {
    ($($get:ident, $set:ident => $pair:ident;)*) => {
        $(
            #[inline]
            pub fn $get(&self) -> u16 {
                self.$pair.get16()
            }

            #[inline]
            pub fn $set(&mut self, val: u16) {
                self.$pair.set16(val)
            }
        )*
    };
}

impl RegisterSet {
    /// Returns the state after the power on or the `RESET` signal.
    ///
    /// `AF` and `SP` are set to `0xFFFF`, everything else is cleared.
    pub fn new() -> Self {
        let mut regs = RegisterSet::default();
        regs.af.set16(0xFFFF);
        regs.sp.set16(0xFFFF);
        regs
    }

    reg8_accessors! {
        a, set_a => af.get8hi / set8hi;
        f, set_f => af.get8lo / set8lo;
        b, set_b => bc.get8hi / set8hi;
        c, set_c => bc.get8lo / set8lo;
        d, set_d => de.get8hi / set8hi;
        e, set_e => de.get8lo / set8lo;
        h, set_h => hl.get8hi / set8hi;
        l, set_l => hl.get8lo / set8lo;
        ixh, set_ixh => ix.get8hi / set8hi;
        ixl, set_ixl => ix.get8lo / set8lo;
        iyh, set_iyh => iy.get8hi / set8hi;
        iyl, set_iyl => iy.get8lo / set8lo;
    }

    reg16_accessors! {
        af, set_af => af;
        bc, set_bc => bc;
        de, set_de => de;
        hl, set_hl => hl;
        af_alt, set_af_alt => af_alt;
        bc_alt, set_bc_alt => bc_alt;
        de_alt, set_de_alt => de_alt;
        hl_alt, set_hl_alt => hl_alt;
        ix, set_ix => ix;
        iy, set_iy => iy;
        sp, set_sp => sp;
        pc, set_pc => pc;
        memptr, set_memptr => memptr;
    }

    /// Returns the current state of the Flags register.
    #[inline]
    pub fn flags(&self) -> CpuFlags {
        CpuFlags::from_bits_retain(self.af.get8lo())
    }

    /// Sets the current state of the Flags register.
    #[inline]
    pub fn set_flags(&mut self, flags: CpuFlags) {
        self.af.set8lo(flags.bits())
    }

    #[inline]
    pub fn i(&self) -> u8 {
        self.i
    }

    #[inline]
    pub fn set_i(&mut self, i: u8) {
        self.i = i;
    }

    /// Returns the memory refresh register.
    #[inline]
    pub fn r(&self) -> u8 {
        self.r
    }

    #[inline]
    pub fn set_r(&mut self, r: u8) {
        self.r = r;
    }

    /// Increments the lower 7 bits of `R`, preserving bit 7.
    #[inline]
    pub fn inc_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    /// Returns the address put on the bus during the memory refresh: `I << 8 | R`.
    #[inline]
    pub fn ir(&self) -> u16 {
        u16::from_be_bytes([self.i, self.r])
    }

    /// Returns values of interrupt flip-flops `(iff1, iff2)`.
    #[inline]
    pub fn iffs(&self) -> (bool, bool) {
        (self.iff1, self.iff2)
    }

    #[inline]
    pub fn set_iffs(&mut self, iff1: bool, iff2: bool) {
        self.iff1 = iff1;
        self.iff2 = iff2;
    }

    #[inline]
    pub fn im(&self) -> InterruptMode {
        self.im
    }

    #[inline]
    pub fn set_im(&mut self, im: InterruptMode) {
        self.im = im;
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// Swaps the `AF` register with its alternative counterpart `AF'`.
    #[inline]
    pub fn ex_af(&mut self) {
        core::mem::swap(&mut self.af, &mut self.af_alt);
    }

    /// Swaps the `BC`, `DE` and `HL` registers with their alternative counterparts `BC'`, `DE'` and `HL'`.
    #[inline]
    pub fn exx(&mut self) {
        core::mem::swap(&mut self.bc, &mut self.bc_alt);
        core::mem::swap(&mut self.de, &mut self.de_alt);
        core::mem::swap(&mut self.hl, &mut self.hl_alt);
    }

    /// Returns the index register pair selected by the prefix or `HL` if there is none.
    #[inline]
    pub(crate) fn hl_or_index(&mut self, prefix: Option<Prefix>) -> &mut RegisterPair {
        match prefix {
            None => &mut self.hl,
            Some(Prefix::Xdd) => &mut self.ix,
            Some(Prefix::Yfd) => &mut self.iy,
        }
    }

    /// Returns the content of the selected 8-bit register.
    ///
    /// If the `prefix` argument is one of [Prefix::Xdd] or [Prefix::Yfd] and the `reg` is [Reg8::H] or [Reg8::L]
    /// the content of the `IXh`, `IXl` or `IYh`, `IYl` will be returned instead.
    pub fn reg8(&self, reg: Reg8, prefix: Option<Prefix>) -> u8 {
        match (reg, prefix) {
            (Reg8::B, _) => self.bc.get8hi(),
            (Reg8::C, _) => self.bc.get8lo(),
            (Reg8::D, _) => self.de.get8hi(),
            (Reg8::E, _) => self.de.get8lo(),
            (Reg8::H, None) => self.hl.get8hi(),
            (Reg8::L, None) => self.hl.get8lo(),
            (Reg8::H, Some(Prefix::Xdd)) => self.ix.get8hi(),
            (Reg8::L, Some(Prefix::Xdd)) => self.ix.get8lo(),
            (Reg8::H, Some(Prefix::Yfd)) => self.iy.get8hi(),
            (Reg8::L, Some(Prefix::Yfd)) => self.iy.get8lo(),
            (Reg8::A, _) => self.af.get8hi(),
        }
    }

    /// Sets the content of the selected 8-bit register. See [RegisterSet::reg8].
    pub fn set_reg8(&mut self, reg: Reg8, prefix: Option<Prefix>, val: u8) {
        match (reg, prefix) {
            (Reg8::B, _) => self.bc.set8hi(val),
            (Reg8::C, _) => self.bc.set8lo(val),
            (Reg8::D, _) => self.de.set8hi(val),
            (Reg8::E, _) => self.de.set8lo(val),
            (Reg8::H, None) => self.hl.set8hi(val),
            (Reg8::L, None) => self.hl.set8lo(val),
            (Reg8::H, Some(Prefix::Xdd)) => self.ix.set8hi(val),
            (Reg8::L, Some(Prefix::Xdd)) => self.ix.set8lo(val),
            (Reg8::H, Some(Prefix::Yfd)) => self.iy.set8hi(val),
            (Reg8::L, Some(Prefix::Yfd)) => self.iy.set8lo(val),
            (Reg8::A, _) => self.af.set8hi(val),
        }
    }

    /// Returns the content of the selected pair of registers.
    /// `HL` is replaced by `IX` or `IY` if the `prefix` says so.
    pub fn reg16(&self, reg: Reg16, prefix: Option<Prefix>) -> u16 {
        match (reg, prefix) {
            (Reg16::BC, _) => self.bc.get16(),
            (Reg16::DE, _) => self.de.get16(),
            (Reg16::HL, None) => self.hl.get16(),
            (Reg16::HL, Some(Prefix::Xdd)) => self.ix.get16(),
            (Reg16::HL, Some(Prefix::Yfd)) => self.iy.get16(),
            (Reg16::SP, _) => self.sp.get16(),
        }
    }

    /// Sets the content of the selected pair of registers. See [RegisterSet::reg16].
    pub fn set_reg16(&mut self, reg: Reg16, prefix: Option<Prefix>, val: u16) {
        match (reg, prefix) {
            (Reg16::BC, _) => self.bc.set16(val),
            (Reg16::DE, _) => self.de.set16(val),
            (Reg16::HL, None) => self.hl.set16(val),
            (Reg16::HL, Some(Prefix::Xdd)) => self.ix.set16(val),
            (Reg16::HL, Some(Prefix::Yfd)) => self.iy.set16(val),
            (Reg16::SP, _) => self.sp.set16(val),
        }
    }

    /// Returns the pair of registers used by `PUSH` and `POP` as a tuple `(hi, lo)`.
    pub fn stk_reg16(&self, reg: StkReg16, prefix: Option<Prefix>) -> (u8, u8) {
        match (reg, prefix) {
            (StkReg16::BC, _) => self.bc.get(),
            (StkReg16::DE, _) => self.de.get(),
            (StkReg16::HL, None) => self.hl.get(),
            (StkReg16::HL, Some(Prefix::Xdd)) => self.ix.get(),
            (StkReg16::HL, Some(Prefix::Yfd)) => self.iy.get(),
            (StkReg16::AF, _) => self.af.get(),
        }
    }

    /// Sets the pair of registers used by `PUSH` and `POP`.
    pub fn set_stk_reg16(&mut self, reg: StkReg16, prefix: Option<Prefix>, hi: u8, lo: u8) {
        match (reg, prefix) {
            (StkReg16::BC, _) => self.bc.set(hi, lo),
            (StkReg16::DE, _) => self.de.set(hi, lo),
            (StkReg16::HL, None) => self.hl.set(hi, lo),
            (StkReg16::HL, Some(Prefix::Xdd)) => self.ix.set(hi, lo),
            (StkReg16::HL, Some(Prefix::Yfd)) => self.iy.set(hi, lo),
            (StkReg16::AF, _) => self.af.set(hi, lo),
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for RegisterPair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        serializer.serialize_u16(self.get16())
    }
}

#[cfg(feature = "serde")]
struct RegisterPairVisitor;

#[cfg(feature = "serde")]
impl<'de> Visitor<'de> for RegisterPairVisitor {
    type Value = RegisterPair;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a signed or unsigned 16-bit integer, a tuple of 8-bit integers or a hex string")
    }

    fn visit_i16<E: de::Error>(self, value: i16) -> Result<Self::Value, E> {
        Ok(RegisterPair::from(value))
    }

    fn visit_u16<E: de::Error>(self, value: u16) -> Result<Self::Value, E> {
        Ok(RegisterPair::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        i16::try_from(value).map(RegisterPair::from)
            .map_err(|_| E::custom(format!("RegisterPair out of range: {}", value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        u16::try_from(value).map(RegisterPair::from)
            .map_err(|_| E::custom(format!("RegisterPair out of range: {}", value)))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where A: SeqAccess<'de>
    {
        if let Some(lo) = seq.next_element::<u8>()? {
            if let Some(hi) = seq.next_element::<u8>()? {
                if seq.next_element::<u8>()?.is_none() {
                    return Ok(RegisterPair::from([lo, hi]))
                }
            }
        }
        Err(de::Error::custom("RegisterPair expects a tuple of 8-bit integers"))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        let body = s.strip_prefix('$')
                    .or_else(|| s.strip_prefix("0x"))
                    .unwrap_or(s);
        let uint = u16::from_str_radix(body, 16).map_err(|_|
                        de::Error::custom("RegisterPair expects a hexadecimal string"))?;
        Ok(RegisterPair::from(uint))
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for RegisterPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(RegisterPairVisitor)
        }
        else {
            deserializer.deserialize_u16(RegisterPairVisitor)
        }
    }
}
