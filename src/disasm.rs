/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Utilities for disassembling Z80 machine code.
//!
//! The disassembler is driven by the same [instruction tables][crate::z80::table] as the interpreter.
//!
//! Numbers are formatted in the assembler's hexadecimal notation, e.g. `0FEH`, `1234H`.
//! ```
//! use trs80emu::disasm::disassemble;
//!
//! let dis = disassemble(0x4000, &[0xDD, 0x7E, 0x05]);
//! assert_eq!(dis.len(), 3);
//! assert_eq!(dis.to_string_brief(), "LD A,(IX+05H)");
//! ```
use core::fmt::{self, Write};
use arrayvec::ArrayVec;

use crate::cpu::Prefix;
use crate::z80::table::{decode, Operand, MAX_INSTRUCTION_LEN};

/// A copy of the instruction's full byte code.
pub type DisassemblyCode = ArrayVec<u8, MAX_INSTRUCTION_LEN>;

/// A single disassembled instruction.
///
/// [Display][fmt::Display] renders the address, the instruction and its bytes:
/// ```text
/// 0100H JR NZ,0123H          [20 21]
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disassembly {
    /// The address of the first byte of the instruction.
    pub pc: u16,
    /// The bytes of the instruction including all prefixes.
    pub code: DisassemblyCode,
    pub mnemonic: &'static str,
    /// The index prefix modifying the operands.
    pub prefix: Option<Prefix>,
    pub operands: ArrayVec<Operand, 3>,
    /// The index displacement.
    pub displacement: Option<i8>,
    /// An immediate value, an address, a port or a relative jump offset.
    pub data: Option<u16>,
}

/// Formats a number as `0FEH`.
struct Hex8(u8);
/// Formats a number as `0C000H`.
struct Hex16(u16);

impl fmt::Display for Hex8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 0xA0 {
            f.write_char('0')?;
        }
        write!(f, "{:02X}H", self.0)
    }
}

impl fmt::Display for Hex16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 0xA000 {
            f.write_char('0')?;
        }
        write!(f, "{:04X}H", self.0)
    }
}

impl Disassembly {
    /// The number of bytes of the instruction.
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the instruction as text without the address and bytes, e.g. `LD IX,1234H`.
    pub fn to_string_brief(&self) -> String {
        let mut s = String::new();
        // writing to a String never fails
        let _ = self.write_brief(&mut s);
        s
    }

    fn write_brief<W: Write>(&self, f: &mut W) -> fmt::Result {
        f.write_str(self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            f.write_char(if i == 0 { ' ' } else { ',' })?;
            self.write_operand(f, *op)?;
        }
        Ok(())
    }

    fn write_operand<W: Write>(&self, f: &mut W, op: Operand) -> fmt::Result {
        let data = self.data.unwrap_or(0);
        let prefix_name = match self.prefix {
            Some(prefix) => prefix.as_str(),
            None => "HL"
        };
        match op {
            Operand::Reg8(reg) => f.write_str(reg.as_str_with_prefix(self.prefix)),
            Operand::Reg8Fixed(reg) => f.write_str(reg.as_str()),
            Operand::Reg16(reg) => f.write_str(reg.as_str_with_prefix(self.prefix)),
            Operand::Stk16(reg) => f.write_str(reg.as_str_with_prefix(self.prefix)),
            Operand::Cond(cond) => f.write_str(cond.as_str()),
            Operand::Imm8 => write!(f, "{}", Hex8(data as u8)),
            Operand::Imm16 => write!(f, "{}", Hex16(data)),
            Operand::Addr16 => write!(f, "({})", Hex16(data)),
            Operand::Port8 => write!(f, "({})", Hex8(data as u8)),
            Operand::Relative => {
                let target = self.pc.wrapping_add(self.len() as u16)
                                    .wrapping_add(data as u8 as i8 as i16 as u16);
                write!(f, "{}", Hex16(target))
            }
            Operand::RegAddr(reg) => write!(f, "({})", reg.as_str()),
            Operand::Indirect => match self.displacement {
                Some(d) if self.prefix.is_some() => {
                    let sign = if d < 0 { '-' } else { '+' };
                    write!(f, "({}{}{})", prefix_name, sign, Hex8(d.unsigned_abs()))
                }
                _ => f.write_str("(HL)")
            }
            Operand::JumpPtr => write!(f, "({})", prefix_name),
            Operand::BitNum(n) => write!(f, "{}", n),
            Operand::Restart(addr) => write!(f, "{}", Hex8(addr as u8)),
            Operand::IntMode(mode) => write!(f, "{}", mode),
            Operand::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}H {:<20} [", self.pc, self.to_string_brief())?;
        for (i, byte) in self.code.iter().enumerate() {
            if i != 0 {
                f.write_char(' ')?;
            }
            write!(f, "{:02X}", byte)?;
        }
        f.write_char(']')
    }
}

/// Disassembles a single instruction from the beginning of `code`.
///
/// `pc` is the address of the first byte of `code`, needed to resolve relative jump targets.
///
/// If `code` ends before the instruction does, its first byte is returned as `DEFB nnH`.
pub fn disassemble(pc: u16, code: &[u8]) -> Disassembly {
    match decode(code) {
        Some(dec) => Disassembly {
            pc,
            code: code[..dec.len].iter().copied().collect(),
            mnemonic: dec.instruction.mnemonic,
            prefix: dec.prefix,
            operands: dec.instruction.operands().collect(),
            displacement: dec.displacement,
            data: dec.data,
        },
        None => {
            let mut dis = Disassembly {
                pc,
                code: ArrayVec::new(),
                mnemonic: "DEFB",
                prefix: None,
                operands: ArrayVec::new(),
                displacement: None,
                data: None
            };
            if let Some(&byte) = code.first() {
                dis.code.push(byte);
                dis.operands.push(Operand::Imm8);
                dis.data = Some(byte.into());
            }
            dis
        }
    }
}

/// Disassembles up to `count` instructions from `mem` starting at the address `start`.
///
/// `mem` is addressed from `0`. Stops early at the end of `mem`.
pub fn disassemble_memory(mem: &[u8], start: u16, count: usize) -> Vec<Disassembly> {
    let mut res = Vec::with_capacity(count);
    let mut pc = start;
    while res.len() < count {
        let from = pc as usize;
        if from >= mem.len() {
            break;
        }
        let to = mem.len().min(from + MAX_INSTRUCTION_LEN);
        let dis = disassemble(pc, &mem[from..to]);
        pc = pc.wrapping_add(dis.len() as u16);
        res.push(dis);
        if pc as usize <= from {
            break;
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(pc: u16, code: &[u8]) -> String {
        let dis = disassemble(pc, code);
        assert_eq!(dis.len(), code.len(), "{}", dis);
        dis.to_string_brief()
    }

    #[test]
    fn disasm_works() {
        assert_eq!(brief(0x0100, &[0x20, 0x21]), "JR NZ,0123H");
        assert_eq!(brief(0, &[0x3E, 0xA5]), "LD A,0A5H");
        assert_eq!(brief(0, &[0x32, 0x00, 0xC0]), "LD (0C000H),A");
        assert_eq!(brief(0, &[0x2A, 0x34, 0x12]), "LD HL,(1234H)");
        assert_eq!(brief(0, &[0x0A]), "LD A,(BC)");
        assert_eq!(brief(0, &[0xDB, 0xFE]), "IN A,(0FEH)");
        assert_eq!(brief(0, &[0xD3, 0x01]), "OUT (01H),A");
        assert_eq!(brief(0, &[0x86]), "ADD A,(HL)");
        assert_eq!(brief(0, &[0xD6, 0xFF]), "SUB 0FFH");
        assert_eq!(brief(0, &[0x9F]), "SBC A,A");
        assert_eq!(brief(0, &[0xF5]), "PUSH AF");
        assert_eq!(brief(0, &[0x08]), "EX AF,AF'");
        assert_eq!(brief(0, &[0xE3]), "EX (SP),HL");
        assert_eq!(brief(0, &[0xC8]), "RET Z");
        assert_eq!(brief(0, &[0xFA, 0x00, 0x40]), "JP M,4000H");
        assert_eq!(brief(0, &[0xED, 0x5E]), "IM 2");
        assert_eq!(brief(0, &[0xED, 0x57]), "LD A,I");
        assert_eq!(brief(0, &[0xED, 0x73, 0xFF, 0xFF]), "LD (0FFFFH),SP");
        assert_eq!(brief(0, &[0xED, 0x6A]), "ADC HL,HL");
        assert_eq!(brief(0, &[0xED, 0xB8]), "LDDR");
        assert_eq!(brief(0, &[0xDD, 0x7E, 0x05]), "LD A,(IX+05H)");
        assert_eq!(brief(0, &[0xDD, 0x66, 0x05]), "LD H,(IX+05H)");
        assert_eq!(brief(0, &[0xFD, 0x77, 0x80]), "LD (IY-80H),A");
        assert_eq!(brief(0, &[0xDD, 0x36, 0xFF, 0x42]), "LD (IX-01H),42H");
        assert_eq!(brief(0, &[0xFD, 0xE5]), "PUSH IY");
        assert_eq!(brief(0, &[0xDD, 0xE3]), "EX (SP),IX");
        assert_eq!(brief(0, &[0xDD, 0xE9]), "JP (IX)");
        assert_eq!(brief(0, &[0xE9]), "JP (HL)");
        assert_eq!(brief(0, &[0xFD, 0xF9]), "LD SP,IY");
        assert_eq!(brief(0, &[0xDD, 0x29]), "ADD IX,IX");
        assert_eq!(brief(0, &[0xDD, 0xEB]), "EX DE,HL");
        assert_eq!(brief(0, &[0xFD, 0x3C]), "INC A");
    }

    #[test]
    fn disasm_undocumented() {
        assert_eq!(brief(0, &[0xDD, 0x26, 0x05]), "LD IXH,05H");
        assert_eq!(brief(0, &[0xFD, 0x65]), "LD IYH,IYL");
        assert_eq!(brief(0, &[0xDD, 0x84]), "ADD A,IXH");
        assert_eq!(brief(0, &[0xCB, 0x30]), "SLL B");
        assert_eq!(brief(0, &[0xDD, 0xCB, 0x00, 0x00]), "RLC (IX+00H),B");
        assert_eq!(brief(0, &[0xFD, 0xCB, 0x10, 0x4F]), "BIT 1,(IY+10H)");
        assert_eq!(brief(0, &[0xDD, 0xCB, 0x02, 0x87]), "RES 0,(IX+02H),A");
        assert_eq!(brief(0, &[0xED, 0x70]), "IN F,(C)");
        assert_eq!(brief(0, &[0xED, 0x71]), "OUT (C),0");
        assert_eq!(brief(0, &[0xED, 0x4E]), "IM 0");
        assert_eq!(brief(0, &[0xED, 0x54]), "NEG");
        assert_eq!(brief(0, &[0xED, 0x00]), "NOP*");
        assert_eq!(disassemble(0, &[0xDD, 0xDD]).to_string_brief(), "NONI");
        assert_eq!(brief(0, &[0xDD, 0xED, 0xB0]), "LDIR");
        assert_eq!(brief(0, &[0xDD, 0xED, 0x43, 0x34, 0x12]), "LD (1234H),BC");
        assert_eq!(brief(0, &[0xFD, 0xED, 0x7B, 0x00, 0xC0]), "LD SP,(0C000H)");
    }

    #[test]
    fn disasm_index_prefix_before_ed() {
        for prefix in [0xDD, 0xFD] {
            for op in 0..=255 {
                let code = [prefix, 0xED, op, 0x34, 0x12];
                let dis = disassemble(0, &code);
                let plain = disassemble(0, &code[1..]);
                assert_eq!(dis.len(), plain.len() + 1);
                assert_eq!(dis.code[..], code[..dis.len()]);
                assert_eq!(dis.to_string_brief(), plain.to_string_brief());
                assert_eq!(dis.prefix, None);
            }
        }
        let mem = [0xDD, 0xED, 0x4B, 0x00, 0x40, 0x00];
        let lines: Vec<String> = disassemble_memory(&mem, 0, 2).iter().map(|dis| dis.to_string_brief()).collect();
        assert_eq!(lines, ["LD BC,(4000H)", "NOP"]);
    }

    #[test]
    fn disasm_truncated() {
        let dis = disassemble(0, &[0x21, 0x00]);
        assert_eq!(dis.len(), 1);
        assert_eq!(dis.to_string_brief(), "DEFB 21H");
        let dis = disassemble(0, &[]);
        assert!(dis.is_empty());
        assert_eq!(dis.to_string_brief(), "DEFB");
    }

    #[test]
    fn disasm_display() {
        let dis = disassemble(0x0100, &[0x20, 0x21]);
        assert_eq!(dis.to_string(), format!("0100H {:<20} [20 21]", "JR NZ,0123H"));
        let dis = disassemble(0xC000, &[0xFD, 0xCB, 0xFE, 0xC6]);
        assert_eq!(dis.to_string(), format!("C000H {:<20} [FD CB FE C6]", "SET 0,(IY-02H)"));
    }

    #[test]
    fn disasm_memory_works() {
        let mem = [0x09, 0xDD, 0xFD, 0xDD, 0x09, 0x76, 0x00, 0xCB];
        let lines: Vec<String> = disassemble_memory(&mem, 0, 10).iter()
                                .map(|dis| format!("{:04X} {}", dis.pc, dis.to_string_brief()))
                                .collect();
        assert_eq!(lines, [
            "0000 ADD HL,BC",
            "0001 NONI",
            "0002 NONI",
            "0003 ADD IX,BC",
            "0005 HALT",
            "0006 NOP",
            "0007 DEFB 0CBH"]);
        assert_eq!(disassemble_memory(&mem, 3, 2).len(), 2);
        assert!(disassemble_memory(&mem, 8, 2).is_empty());
    }
}
