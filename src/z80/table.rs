/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Static instruction tables.
//!
//! Each table maps an op-code to its [Instruction] descriptor: the mnemonic, the operand layout and
//! the executor function. The tables are built at compile time and are used both by the interpreter
//! and by the [disassembler][crate::disasm].
//!
//! | table       | op-code bytes       |
//! |-------------|---------------------|
//! | [BASE]      | `op`, `DD op`, `FD op` |
//! | [CB]        | `CB op`             |
//! | [ED]        | `ED op`, `DD ED op`, `FD ED op` |
//! | [INDEX_CB]  | `DD CB d op`, `FD CB d op` |
use core::fmt;

use crate::cpu::*;
use crate::host::Hal;
use super::Z80;
use super::instructions::*;

use Operand as Op;

/// The signature of the instruction executor.
///
/// The last argument is the final op-code byte of the instruction.
pub type ExecFn = fn(&mut Z80, &mut dyn Hal, u8);

/// A table of 256 instruction descriptors indexed by an op-code.
pub type Table = [Instruction; 256];

/// The operand layout of an instruction.
///
/// Operands depending on the `0xDD`/`0xFD` prefix are rendered accordingly by the disassembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    /// An 8-bit register. `H` and `L` become the index register halves with a prefix.
    Reg8(Reg8),
    /// An 8-bit register never being substituted by the prefix.
    Reg8Fixed(Reg8),
    /// A register pair. `HL` becomes `IX` or `IY` with a prefix.
    Reg16(Reg16),
    /// A `PUSH` or `POP` register pair. `HL` becomes `IX` or `IY` with a prefix.
    Stk16(StkReg16),
    Cond(Condition),
    /// An immediate 8-bit value.
    Imm8,
    /// An immediate 16-bit value.
    Imm16,
    /// `(nn)`
    Addr16,
    /// `(n)`
    Port8,
    /// A relative jump target.
    Relative,
    /// `(BC)`, `(DE)` or `(SP)`.
    RegAddr(Reg16),
    /// `(HL)`, `(IX+d)` or `(IY+d)`.
    Indirect,
    /// `(HL)`, `(IX)` or `(IY)` of `JP`.
    JumpPtr,
    BitNum(u8),
    Restart(u16),
    IntMode(u8),
    /// A fixed name, e.g. `A`, `AF'`, `(C)`.
    Name(&'static str),
}

/// An instruction descriptor.
#[derive(Clone, Copy)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub operands: [Option<Operand>; 3],
    pub exec: ExecFn,
}

/// A decoded instruction.
#[derive(Clone, Copy, Debug)]
pub struct Decoded {
    /// The effective prefix: `None` if the instruction is not modified by the index prefix.
    pub prefix: Option<Prefix>,
    pub instruction: &'static Instruction,
    /// The index displacement of the `(IX+d)` or `(IY+d)` operand.
    pub displacement: Option<i8>,
    /// An immediate value, an address, a port or a relative jump offset.
    pub data: Option<u16>,
    /// The number of bytes of the instruction including all prefixes.
    pub len: usize,
}

impl Operand {
    /// The number of immediate data bytes following the op-code.
    pub const fn data_len(self) -> usize {
        match self {
            Op::Imm8|Op::Port8|Op::Relative => 1,
            Op::Imm16|Op::Addr16 => 2,
            _ => 0
        }
    }
}

impl Instruction {
    const fn new(mnemonic: &'static str, exec: ExecFn) -> Self {
        Instruction { mnemonic, operands: [None; 3], exec }
    }

    const fn with(mut self, op: Operand) -> Self {
        let mut i = 0;
        while i < self.operands.len() {
            if self.operands[i].is_none() {
                self.operands[i] = Some(op);
                return self
            }
            i += 1;
        }
        self
    }

    const fn with_opt(self, op: Option<Operand>) -> Self {
        match op {
            Some(op) => self.with(op),
            None => self
        }
    }

    /// Returns an iterator of the operands.
    pub fn operands(&self) -> impl Iterator<Item=Operand> + '_ {
        self.operands.iter().map_while(|op| *op)
    }

    /// The total number of immediate data bytes.
    pub fn data_len(&self) -> usize {
        self.operands().map(Operand::data_len).sum()
    }

    /// Returns `true` if one of the operands is `(HL)`, which requires a displacement with a prefix.
    pub fn has_indirect(&self) -> bool {
        self.operands().any(|op| op == Op::Indirect)
    }

    /// Returns `true` if the mnemonic or any of the operands depend on the index prefix.
    pub fn is_prefix_sensitive(&self) -> bool {
        self.operands().any(|op| match op {
            Op::Reg8(Reg8::H|Reg8::L)|Op::Reg16(Reg16::HL)|Op::Stk16(StkReg16::HL)|Op::Indirect|Op::JumpPtr => true,
            _ => false
        })
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
         .field("mnemonic", &self.mnemonic)
         .field("operands", &self.operands)
         .finish()
    }
}

const fn alu_instr(code: u8, src: Operand, exec: ExecFn) -> Instruction {
    let op = Ops8::from_bits(code);
    let instr = Instruction::new(op.as_str(), exec);
    match op {
        Ops8::ADD|Ops8::ADC|Ops8::SBC => instr.with(Op::Name("A")).with(src),
        _ => instr.with(src)
    }
}

const fn base_instr(code: u8) -> Instruction {
    let (x, y, z) = (code >> 6, (code >> 3) & 7, code & 7);
    let (p, q) = (y >> 1, y & 1);
    match x {
        0 => match z {
            0 => match y {
                0 => Instruction::new("NOP", nop),
                1 => Instruction::new("EX", ex_af).with(Op::Name("AF")).with(Op::Name("AF'")),
                2 => Instruction::new("DJNZ", djnz).with(Op::Relative),
                3 => Instruction::new("JR", jr).with(Op::Relative),
                _ => Instruction::new("JR", jr_cc).with(Op::Cond(Condition::from_jr_subset(code))).with(Op::Relative)
            }
            1 if q == 0 => Instruction::new("LD", ld_rp_nn).with(Op::Reg16(Reg16::from_bits(code))).with(Op::Imm16),
            1 => Instruction::new("ADD", add_hl_rp).with(Op::Reg16(Reg16::HL)).with(Op::Reg16(Reg16::from_bits(code))),
            2 => match (q, p) {
                (0, 0|1) => Instruction::new("LD", ld_rp_a).with(Op::RegAddr(Reg16::from_bits(code))).with(Op::Name("A")),
                (0, 2)   => Instruction::new("LD", ld_mem_nn_rp).with(Op::Addr16).with(Op::Reg16(Reg16::HL)),
                (0, _)   => Instruction::new("LD", ld_nn_a).with(Op::Addr16).with(Op::Name("A")),
                (_, 0|1) => Instruction::new("LD", ld_a_rp).with(Op::Name("A")).with(Op::RegAddr(Reg16::from_bits(code))),
                (_, 2)   => Instruction::new("LD", ld_rp_mem_nn).with(Op::Reg16(Reg16::HL)).with(Op::Addr16),
                _        => Instruction::new("LD", ld_a_nn).with(Op::Name("A")).with(Op::Addr16)
            }
            3 => Instruction::new(if q == 0 { "INC" } else { "DEC" }, inc_dec_rp).with(Op::Reg16(Reg16::from_bits(code))),
            4|5 => {
                let mnemonic = if z == 4 { "INC" } else { "DEC" };
                match Reg8::from_b5_3(code) {
                    Some(reg) => Instruction::new(mnemonic, inc_dec_r).with(Op::Reg8(reg)),
                    None => Instruction::new(mnemonic, inc_dec_mem).with(Op::Indirect)
                }
            }
            6 => match Reg8::from_b5_3(code) {
                Some(reg) => Instruction::new("LD", ld_r_n).with(Op::Reg8(reg)).with(Op::Imm8),
                None => Instruction::new("LD", ld_mem_n).with(Op::Indirect).with(Op::Imm8)
            }
            _ => match y {
                0..=3 => Instruction::new(["RLCA", "RRCA", "RLA", "RRA"][y as usize], rot_acc),
                4 => Instruction::new("DAA", daa),
                5 => Instruction::new("CPL", cpl),
                6 => Instruction::new("SCF", scf),
                _ => Instruction::new("CCF", ccf)
            }
        }
        1 => match (Reg8::from_b5_3(code), Reg8::from_b2_0(code)) {
            (Some(dst), Some(src)) => Instruction::new("LD", ld_r_r).with(Op::Reg8(dst)).with(Op::Reg8(src)),
            (Some(dst), None) => Instruction::new("LD", ld_r_mem).with(Op::Reg8Fixed(dst)).with(Op::Indirect),
            (None, Some(src)) => Instruction::new("LD", ld_mem_r).with(Op::Indirect).with(Op::Reg8Fixed(src)),
            (None, None) => Instruction::new("HALT", halt)
        }
        2 => match Reg8::from_b2_0(code) {
            Some(reg) => alu_instr(code, Op::Reg8(reg), alu_r),
            None => alu_instr(code, Op::Indirect, alu_mem)
        }
        _ => match z {
            0 => Instruction::new("RET", ret_cc).with(Op::Cond(Condition::from_bits(code))),
            1 => match (q, p) {
                (0, _) => Instruction::new("POP", pop).with(Op::Stk16(StkReg16::from_bits(code))),
                (_, 0) => Instruction::new("RET", ret),
                (_, 1) => Instruction::new("EXX", exx),
                (_, 2) => Instruction::new("JP", jp_hl).with(Op::JumpPtr),
                _      => Instruction::new("LD", ld_sp_hl).with(Op::Reg16(Reg16::SP)).with(Op::Reg16(Reg16::HL))
            }
            2 => Instruction::new("JP", jp_cc).with(Op::Cond(Condition::from_bits(code))).with(Op::Imm16),
            3 => match y {
                0 => Instruction::new("JP", jp).with(Op::Imm16),
                1 => Instruction::new("CB", prefix_cb),
                2 => Instruction::new("OUT", out_n_a).with(Op::Port8).with(Op::Name("A")),
                3 => Instruction::new("IN", in_a_n).with(Op::Name("A")).with(Op::Port8),
                4 => Instruction::new("EX", ex_sp_hl).with(Op::RegAddr(Reg16::SP)).with(Op::Reg16(Reg16::HL)),
                5 => Instruction::new("EX", ex_de_hl).with(Op::Name("DE")).with(Op::Name("HL")),
                6 => Instruction::new("DI", di),
                _ => Instruction::new("EI", ei)
            }
            4 => Instruction::new("CALL", call_cc).with(Op::Cond(Condition::from_bits(code))).with(Op::Imm16),
            5 => match (q, p) {
                (0, _) => Instruction::new("PUSH", push).with(Op::Stk16(StkReg16::from_bits(code))),
                (_, 0) => Instruction::new("CALL", call).with(Op::Imm16),
                (_, 2) => Instruction::new("ED", prefix_ed),
                _      => Instruction::new("NONI", prefix_index)
            }
            6 => alu_instr(code, Op::Imm8, alu_n),
            _ => Instruction::new("RST", rst).with(Op::Restart(parse_restart_address(code)))
        }
    }
}

const fn cb_instr(code: u8) -> Instruction {
    let bitnum = Op::BitNum(parse_code_bitnum(code));
    let res_set = if code & 0b0100_0000 == 0 { "RES" } else { "SET" };
    match (code >> 6, Reg8::from_b2_0(code)) {
        (0, Some(reg)) => Instruction::new(Rot::from_bits(code).as_str(), rot_r).with(Op::Reg8Fixed(reg)),
        (0, None)      => Instruction::new(Rot::from_bits(code).as_str(), rot_mem).with(Op::Indirect),
        (1, Some(reg)) => Instruction::new("BIT", bit_r).with(bitnum).with(Op::Reg8Fixed(reg)),
        (1, None)      => Instruction::new("BIT", bit_mem).with(bitnum).with(Op::Indirect),
        (_, Some(reg)) => Instruction::new(res_set, res_set_r).with(bitnum).with(Op::Reg8Fixed(reg)),
        (_, None)      => Instruction::new(res_set, res_set_mem).with(bitnum).with(Op::Indirect)
    }
}

const fn index_cb_instr(code: u8) -> Instruction {
    let bitnum = Op::BitNum(parse_code_bitnum(code));
    let copy = match Reg8::from_b2_0(code) {
        Some(reg) => Some(Op::Reg8Fixed(reg)),
        None => None
    };
    match code >> 6 {
        0 => Instruction::new(Rot::from_bits(code).as_str(), index_rot_res_set).with(Op::Indirect).with_opt(copy),
        1 => Instruction::new("BIT", index_bit).with(bitnum).with(Op::Indirect),
        2 => Instruction::new("RES", index_rot_res_set).with(bitnum).with(Op::Indirect).with_opt(copy),
        _ => Instruction::new("SET", index_rot_res_set).with(bitnum).with(Op::Indirect).with_opt(copy)
    }
}

const BLOCK_MNEMONICS: [[&str; 4]; 4] = [
    ["LDI",  "CPI",  "INI",  "OUTI"],
    ["LDD",  "CPD",  "IND",  "OUTD"],
    ["LDIR", "CPIR", "INIR", "OTIR"],
    ["LDDR", "CPDR", "INDR", "OTDR"],
];

const fn ed_instr(code: u8) -> Instruction {
    let (x, y, z) = (code >> 6, (code >> 3) & 7, code & 7);
    let q = y & 1;
    match x {
        1 => match z {
            0 => match Reg8::from_b5_3(code) {
                Some(reg) => Instruction::new("IN", in_r_c).with(Op::Reg8Fixed(reg)).with(Op::Name("(C)")),
                None => Instruction::new("IN", in_r_c).with(Op::Name("F")).with(Op::Name("(C)"))
            }
            1 => match Reg8::from_b5_3(code) {
                Some(reg) => Instruction::new("OUT", out_c_r).with(Op::Name("(C)")).with(Op::Reg8Fixed(reg)),
                None => Instruction::new("OUT", out_c_r).with(Op::Name("(C)")).with(Op::Name("0"))
            }
            2 => Instruction::new(if q == 0 { "SBC" } else { "ADC" }, sbc_adc_hl_rp)
                            .with(Op::Reg16(Reg16::HL)).with(Op::Reg16(Reg16::from_bits(code))),
            3 if q == 0 => Instruction::new("LD", ld_mem_nn_rp).with(Op::Addr16).with(Op::Reg16(Reg16::from_bits(code))),
            3 => Instruction::new("LD", ld_rp_mem_nn).with(Op::Reg16(Reg16::from_bits(code))).with(Op::Addr16),
            4 => Instruction::new("NEG", neg),
            5 => Instruction::new(if y == 1 { "RETI" } else { "RETN" }, retn),
            6 => Instruction::new("IM", im).with(Op::IntMode(parse_interrupt_mode(code))),
            _ => match y {
                0 => Instruction::new("LD", ld_i_a).with(Op::Name("I")).with(Op::Name("A")),
                1 => Instruction::new("LD", ld_r_a).with(Op::Name("R")).with(Op::Name("A")),
                2 => Instruction::new("LD", ld_a_i).with(Op::Name("A")).with(Op::Name("I")),
                3 => Instruction::new("LD", ld_a_r).with(Op::Name("A")).with(Op::Name("R")),
                4 => Instruction::new("RRD", rxd),
                5 => Instruction::new("RLD", rxd),
                _ => Instruction::new("NOP*", noni)
            }
        }
        2 if y >= 4 && z <= 3 => {
            let mnemonic = BLOCK_MNEMONICS[(y - 4) as usize][z as usize];
            match z {
                0 => Instruction::new(mnemonic, ldx),
                1 => Instruction::new(mnemonic, cpx),
                2 => Instruction::new(mnemonic, inx),
                _ => Instruction::new(mnemonic, outx)
            }
        }
        _ => Instruction::new("NOP*", noni)
    }
}

macro_rules! build_table {
    ($instr:ident) => {{
        let mut table = [Instruction::new("NOP", nop); 256];
        let mut code = 0;
        while code < 256 {
            table[code] = $instr(code as u8);
            code += 1;
        }
        table
    }};
}

/// The longest instruction: an ignored index prefix followed by `0xED`, an op-code and a 16-bit address.
pub const MAX_INSTRUCTION_LEN: usize = 5;

/// Unprefixed op-codes and op-codes following the `0xDD` or `0xFD` prefix.
pub static BASE: Table = build_table!(base_instr);
/// Op-codes following the `0xCB` prefix.
pub static CB: Table = build_table!(cb_instr);
/// Op-codes following the `0xED` prefix.
pub static ED: Table = build_table!(ed_instr);
/// Op-codes following the `0xDD 0xCB d` or `0xFD 0xCB d` prefixes.
pub static INDEX_CB: Table = build_table!(index_cb_instr);

/// Decodes the instruction at the beginning of `code`.
///
/// Returns `None` if `code` is too short to contain the whole instruction.
///
/// A prefix directly followed by another `0xDD` or `0xFD` prefix is decoded as a single byte `NONI` instruction.
pub fn decode(code: &[u8]) -> Option<Decoded> {
    let first = *code.first()?;
    let (mut prefix, mut pos) = match Prefix::from_code(first) {
        Some(pfx) => {
            let next = *code.get(1)?;
            if Prefix::from_code(next).is_some() {
                return Some(Decoded {
                    prefix: Some(pfx),
                    instruction: &BASE[first as usize],
                    displacement: None,
                    data: None,
                    len: 1
                })
            }
            (Some(pfx), 1)
        }
        None => (None, 0)
    };
    let op = *code.get(pos)?;
    pos += 1;
    let mut displacement = None;
    let instruction = match (op, prefix) {
        (0xCB, None) => {
            let op = *code.get(pos)?;
            pos += 1;
            &CB[op as usize]
        }
        (0xCB, Some(_)) => {
            displacement = Some(*code.get(pos)? as i8);
            let op = *code.get(pos + 1)?;
            pos += 2;
            &INDEX_CB[op as usize]
        }
        (0xED, _) => {
            prefix = None;
            let op = *code.get(pos)?;
            pos += 1;
            &ED[op as usize]
        }
        _ => &BASE[op as usize]
    };
    if prefix.is_some() {
        if !instruction.is_prefix_sensitive() {
            prefix = None;
        }
        else if displacement.is_none() && instruction.has_indirect() {
            displacement = Some(*code.get(pos)? as i8);
            pos += 1;
        }
    }
    let data = match instruction.data_len() {
        0 => None,
        1 => Some(*code.get(pos)? as u16),
        _ => Some(u16::from_le_bytes([*code.get(pos)?, *code.get(pos + 1)?]))
    };
    pos += instruction.data_len();
    Some(Decoded { prefix, instruction, displacement, data, len: pos })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_work() {
        assert_eq!(BASE[0x00].mnemonic, "NOP");
        assert_eq!(BASE[0x76].mnemonic, "HALT");
        assert_eq!(BASE[0x7E].operands, [Some(Op::Reg8Fixed(Reg8::A)), Some(Op::Indirect), None]);
        assert_eq!(BASE[0x44].operands, [Some(Op::Reg8(Reg8::B)), Some(Op::Reg8(Reg8::H)), None]);
        assert_eq!(BASE[0x90].operands, [Some(Op::Reg8(Reg8::B)), None, None]);
        assert_eq!(BASE[0x88].operands, [Some(Op::Name("A")), Some(Op::Reg8(Reg8::B)), None]);
        assert_eq!(BASE[0xDD].mnemonic, "NONI");
        assert_eq!(BASE[0xFD].mnemonic, "NONI");
        assert_eq!(CB[0x36].mnemonic, "SLL");
        assert_eq!(ED[0x00].mnemonic, "NOP*");
        assert_eq!(ED[0xB0].mnemonic, "LDIR");
        assert_eq!(ED[0xBB].mnemonic, "OTDR");
        assert_eq!(ED[0x4D].mnemonic, "RETI");
        assert_eq!(ED[0x7D].mnemonic, "RETN");
        assert_eq!(ED[0x6E].operands[0], Some(Op::IntMode(0)));
        assert_eq!(ED[0x7E].operands[0], Some(Op::IntMode(2)));
        assert_eq!(INDEX_CB[0x46].operands, [Some(Op::BitNum(0)), Some(Op::Indirect), None]);
        assert_eq!(INDEX_CB[0x47].operands, [Some(Op::BitNum(0)), Some(Op::Indirect), None]);
        assert_eq!(INDEX_CB[0xC0].operands, [Some(Op::BitNum(0)), Some(Op::Indirect), Some(Op::Reg8Fixed(Reg8::B))]);
        assert_eq!(BASE[0x21].data_len(), 2);
        assert_eq!(BASE[0x36].data_len(), 1);
        assert!(BASE[0x36].has_indirect());
        assert!(!BASE[0x3C].is_prefix_sensitive());
    }

    #[test]
    fn decode_works() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0xDD]).is_none());
        assert!(decode(&[0x21, 0x34]).is_none());
        assert!(decode(&[0xDD, 0x36, 0x05]).is_none());
        let dec = decode(&[0x21, 0x34, 0x12]).unwrap();
        assert_eq!(dec.len, 3);
        assert_eq!(dec.data, Some(0x1234));
        assert_eq!(dec.prefix, None);
        let dec = decode(&[0xDD, 0x36, 0x05, 0x42]).unwrap();
        assert_eq!(dec.len, 4);
        assert_eq!(dec.prefix, Some(Prefix::Xdd));
        assert_eq!(dec.displacement, Some(5));
        assert_eq!(dec.data, Some(0x42));
        let dec = decode(&[0xFD, 0xCB, 0xFE, 0xC6]).unwrap();
        assert_eq!(dec.len, 4);
        assert_eq!(dec.instruction.mnemonic, "SET");
        assert_eq!(dec.displacement, Some(-2));
        assert_eq!(dec.data, None);
        let dec = decode(&[0xDD, 0xFD, 0x00]).unwrap();
        assert_eq!(dec.len, 1);
        assert_eq!(dec.instruction.mnemonic, "NONI");
        let dec = decode(&[0xDD, 0xED, 0xB0]).unwrap();
        assert_eq!(dec.len, 3);
        assert_eq!(dec.prefix, None);
        assert_eq!(dec.instruction.mnemonic, "LDIR");
        let dec = decode(&[0xFD, 0xED, 0x43, 0x34, 0x12]).unwrap();
        assert_eq!(dec.len, MAX_INSTRUCTION_LEN);
        assert_eq!(dec.prefix, None);
        assert_eq!(dec.data, Some(0x1234));
        let dec = decode(&[0xFD, 0x3C]).unwrap();
        assert_eq!(dec.len, 2);
        assert_eq!(dec.prefix, None);
        let dec = decode(&[0xDD, 0xE9]).unwrap();
        assert_eq!(dec.len, 2);
        assert_eq!(dec.prefix, Some(Prefix::Xdd));
        assert_eq!(dec.displacement, None);
    }
}
