/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module contains various op-code bits parsing methods and their enum representations.
//!
//! All conversions are `const` so the instruction tables can be built at compile time from them.
#![allow(clippy::inconsistent_digit_grouping)]
use core::fmt;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize};
use super::flags::CpuFlags;

/// A prefix enum that modifies behaviour of the next op-code.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Prefix {
    Xdd  = 0xDD,
    Yfd  = 0xFD
}

impl Prefix {
    /// Returns the name of the index register.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Prefix::Xdd  => "IX",
            Prefix::Yfd  => "IY",
        }
    }

    /// Returns a prefix if `code` is one of `0xDD` or `0xFD`.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Prefix> {
        match code {
            0xDD => Some(Prefix::Xdd),
            0xFD => Some(Prefix::Yfd),
            _ => None
        }
    }
}

/// Displays prefix as a corresponding register pair.
impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Prefix::Xdd  => "IX",
            Prefix::Yfd  => "IY",
        })
    }
}

/// Defines an enum which variants exhaust all bitwise combinations of `$mask`.
///
/// Variants must be listed in ascending order of their values.
macro_rules! reg_enum_mask_from {
    ($(#[$meta:meta])* $vis:vis $name:ident & ($mask:expr) {$($n:ident = $e:expr;)*}) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        $vis enum $name {
            $($n = $e,)*
        }

        impl $name {
            const VARIANTS: &'static [$name] = &[$($name::$n,)*];
            /// Converts masked bits of an op-code into the enum.
            #[inline(always)]
            pub const fn from_bits(value: u8) -> Self {
                Self::VARIANTS[((value & ($mask)) >> ($mask as u8).trailing_zeros()) as usize]
            }
            /// Returns the name of the variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$n => stringify!($n),)*
                }
            }
        }

        impl From<u8> for $name {
            #[inline(always)]
            fn from(value: u8) -> Self {
                $name::from_bits(value)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// An 8-bit register selected by 3 bits of an op-code.
///
/// The bit combination `0b110` selects `(HL)` (or an immediate value) and has no variant here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg8 {
    B = 0b000,
    C = 0b001,
    D = 0b010,
    E = 0b011,
    H = 0b100,
    L = 0b101,
    A = 0b111,
}

reg_enum_mask_from!{
    /// A register pair selected by bits 4..=5 of `PUSH`/`POP` op-codes.
    pub StkReg16  & (0b00_11_0000) {
        BC = 0b00_00_0000;
        DE = 0b00_01_0000;
        HL = 0b00_10_0000;
        AF = 0b00_11_0000;
    }
}

reg_enum_mask_from!{
    /// A register pair selected by bits 4..=5 of 16-bit op-codes.
    pub Reg16 & (0b00_11_0000) {
        BC = 0b00_00_0000;
        DE = 0b00_01_0000;
        HL = 0b00_10_0000;
        SP = 0b00_11_0000;
    }
}

reg_enum_mask_from!{
    /// The 8-bit arithmetic and logic operations.
    pub Ops8   & (0b00_111_000) {
        ADD = 0b00_000_000;
        ADC = 0b00_001_000;
        SUB = 0b00_010_000;
        SBC = 0b00_011_000;
        AND = 0b00_100_000;
        XOR = 0b00_101_000;
        OR  = 0b00_110_000;
        CP  = 0b00_111_000;
    }
}

reg_enum_mask_from!{
    /// The shift and rotate operations of the `0xCB` group.
    pub Rot    & (0b00_111_000) {
        RLC = 0b00_000_000;
        RRC = 0b00_001_000;
        RL  = 0b00_010_000;
        RR  = 0b00_011_000;
        SLA = 0b00_100_000;
        SRA = 0b00_101_000;
        SLL = 0b00_110_000;
        SRL = 0b00_111_000;
    }
}

reg_enum_mask_from!{
    /// Branch conditions.
    pub Condition
           & (0b00_111_000) {
        NZ  = 0b00_000_000;
        Z   = 0b00_001_000;
        NC  = 0b00_010_000;
        C   = 0b00_011_000;
        PO  = 0b00_100_000;
        PE  = 0b00_101_000;
        P   = 0b00_110_000;
        M   = 0b00_111_000;
    }
}

impl Condition {
    /// Parses JR cc OPCODE into one of the conditional variant.
    #[inline]
    pub const fn from_jr_subset(code: u8) -> Self {
        Condition::from_bits(code & 0b00_011_000)
    }

    #[inline]
    pub fn is_satisfied(self, flags: CpuFlags) -> bool {
        match self {
            Condition::NZ =>  !flags.contains(CpuFlags::Z),
            Condition::Z  =>  flags.contains(CpuFlags::Z),
            Condition::NC =>  !flags.contains(CpuFlags::C),
            Condition::C  =>  flags.contains(CpuFlags::C),
            Condition::PO =>  !flags.contains(CpuFlags::PV),
            Condition::PE =>  flags.contains(CpuFlags::PV),
            Condition::P  =>  !flags.contains(CpuFlags::S),
            Condition::M  =>  flags.contains(CpuFlags::S),
        }
    }
}

impl core::str::FromStr for Condition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NZ" => Ok(Condition::NZ),
            "Z"  => Ok(Condition::Z),
            "NC" => Ok(Condition::NC),
            "C"  => Ok(Condition::C),
            "PO" => Ok(Condition::PO),
            "PE" => Ok(Condition::PE),
            "P"  => Ok(Condition::P),
            "M"  => Ok(Condition::M),
            _ => Err(())
        }
    }
}

impl Reg8 {
    /// Attempts to convert bits 0..=2 of `code` into a Reg8 enum.
    /// Returns `None` for the `(HL)` combination.
    #[inline(always)]
    pub const fn from_b2_0(code: u8) -> Option<Reg8> {
        match code & 0b111 {
            0b000 => Some(Reg8::B),
            0b001 => Some(Reg8::C),
            0b010 => Some(Reg8::D),
            0b011 => Some(Reg8::E),
            0b100 => Some(Reg8::H),
            0b101 => Some(Reg8::L),
            0b111 => Some(Reg8::A),
            _ => None
        }
    }

    /// Attempts to convert bits 3..=5 of `code` into a Reg8 enum.
    /// Returns `None` for the `(HL)` combination.
    #[inline(always)]
    pub const fn from_b5_3(code: u8) -> Option<Reg8> {
        Reg8::from_b2_0(code >> 3)
    }

    /// Returns the name of the register.
    pub const fn as_str(self) -> &'static str {
        match self {
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
            Reg8::A => "A",
        }
    }

    /// Returns the name of the register modified by the `prefix`.
    /// E.g. for [Reg8::H] returns "IXH" if prefix is [Prefix::Xdd].
    pub const fn as_str_with_prefix(self, prefix: Option<Prefix>) -> &'static str {
        match (self, prefix) {
            (Reg8::H, Some(Prefix::Xdd)) => "IXH",
            (Reg8::H, Some(Prefix::Yfd)) => "IYH",
            (Reg8::L, Some(Prefix::Xdd)) => "IXL",
            (Reg8::L, Some(Prefix::Yfd)) => "IYL",
            _ => self.as_str()
        }
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Reg16 {
    /// Returns the name of the register pair modified by the `prefix`.
    /// E.g. for [Reg16::HL] returns "IX" if prefix is [Prefix::Xdd].
    pub const fn as_str_with_prefix(self, prefix: Option<Prefix>) -> &'static str {
        match (self, prefix) {
            (Reg16::HL, Some(prefix)) => prefix.as_str(),
            _ => self.as_str()
        }
    }
}

impl StkReg16 {
    /// Returns the name of the register pair modified by the `prefix`.
    pub const fn as_str_with_prefix(self, prefix: Option<Prefix>) -> &'static str {
        match (self, prefix) {
            (StkReg16::HL, Some(prefix)) => prefix.as_str(),
            _ => self.as_str()
        }
    }
}

/// Parses the bit number of `BIT`, `RES` and `SET` op-codes.
#[inline(always)]
pub const fn parse_code_bitnum(code: u8) -> u8 {
    (code >> 3) & 7
}

/// Parses RST instruction code as an absolute target address.
#[inline(always)]
pub const fn parse_restart_address(code: u8) -> u16 {
    (code & 0b00_111_000) as u16
}

/// Parses the interrupt mode of an `IM` op-code (`0xED` group).
///
/// Bit 5 clear gives mode 0 also for the undocumented "0/1" encodings.
#[inline(always)]
pub const fn parse_interrupt_mode(code: u8) -> u8 {
    match code & 0b00_011_000 {
        0b00_010_000 => 1,
        0b00_011_000 => 2,
        _ => 0
    }
}
