/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! See: https://faqwiki.zxnet.co.uk/wiki/Z80#Differences_between_NMOS_and_CMOS_Z80s
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::cpu::CpuFlags;

/// Selects the exceptions to the undocumented Z80 behaviour.
///
/// It's been [reported] that depending on the CPU technology (NMOS, CMOS) and the manufacturer (Zilog, NEC, other clones)
/// there are certain differences of undocumented behaviour and mainly affects the way the Flags' undocumented
/// bits 3 and 5 are being modified.
///
/// The TRS-80 models use the NMOS part, which is the default.
///
/// [reported]: https://faqwiki.zxnet.co.uk/wiki/Z80#Differences_between_NMOS_and_CMOS_Z80s
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Flavour {
    /// The Zilog Z80 NMOS version.
    #[default]
    Nmos,
    /// The Zilog Z80 CMOS version.
    Cmos,
    /// The KP1858BM1 or T34BM1 clones of the Z80.
    ///
    /// Differs from [Flavour::Nmos] only in the way [Flavour::memptr_mix] works.
    Bm1,
}

/// Remembers if the Flags were modified by the last and by the current instruction.
///
/// This is the "Q" latch of the real chip. Bits 3 and 5 of the Flags after `SCF` or `CCF` depend on it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QLatch {
    flags_modified: bool,
    last_flags_modified: bool
}

impl Flavour {
    /// The value being actually put on the data bus while executing the undocumented instruction `OUT (C),0`.
    #[inline]
    pub const fn constant_out_data(self) -> u8 {
        match self {
            Flavour::Cmos => u8::MAX,
            _ => 0
        }
    }

    /// The way MEMPTR is being updated for: `LD (nnnn),A`, `LD (BC),A`, `LD (DE),A` and `OUT (nn),A`.
    ///
    /// The current Accumulator value is being passed as `msb` and the lower 8-bits of the current destination
    /// address as `lsb`. Returns the `(MSB, LSB)` value to set the MEMPTR with.
    #[inline]
    pub const fn memptr_mix(self, msb: u8, lsb: u8) -> (u8, u8) {
        match self {
            Flavour::Bm1 => (0, lsb.wrapping_add(1)),
            _ => (msb, lsb.wrapping_add(1))
        }
    }

    /// Bits 3 and 5 of the returned value will be copied to the Flags register by `SCF` and `CCF`.
    #[inline]
    pub fn get_q(self, latch: QLatch, acc: u8, flags: CpuFlags) -> u8 {
        match self {
            Flavour::Cmos => acc,
            _ if latch.last_flags_modified => acc,
            _ => acc | flags.bits()
        }
    }
}

impl QLatch {
    /// Called each time before an instruction is being executed or an interrupt is being accepted.
    #[inline(always)]
    pub fn begin_instruction(&mut self) {
        self.last_flags_modified = self.flags_modified;
        self.flags_modified = false;
    }

    /// Called each time an instruction modifies the Flags register.
    #[inline(always)]
    pub fn flags_modified(&mut self) {
        self.flags_modified = true;
    }
}
