/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    trs80emu is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    trs80emu is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
/*! # TRS-80 emu

`trs80emu` provides the two timing critical cores of a TRS-80 emulator:

* the [Z80] interpreter, with exact flags (including the undocumented bits 3 and 5 and `MEMPTR`),
  bus cycle accurate T-state accounting and memory/port contention hooks,
* the [cassette tape decoder][tape], reconstructing programs recorded at 250, 500 or 1000 baud
  (low speed) and 1500 baud (high speed) from plain audio samples.

```text
  _______
=|       |=
=|       |=                    _____________
=|       |=                   |             |
=|  Z80  |= <--------------> =| Clock+      |=
=|       |=       Hal         | Memory+Io   |=:::::
=|       |=                   |_____________|
=|_______|=

  samples -+-> [ 250 baud ]  -+
           +-> [ 500 baud ]  -+
           +-> [ 1000 baud ] -+--> Decoder --> [Program, ...]
           +-> [ 1500 baud ] -+
```

The CPU needs exactly one thing from its host: an implementation of the [Hal] trait, which is
composed of [Clock], [Memory] and [Io]. The interpreter holds no memory buffer of its own.
Each call to [Z80::step] executes a single instruction (or a single `0xDD`/`0xFD` prefix),
advancing the [Clock] at the precise points the real chip would assert its bus cycles.

Instructions are dispatched via static, compile time built [tables](z80::table). The same tables
drive the [disassembler](disasm), so there is only a single source of truth about the instruction set.

## Example

```
use trs80emu::{Clock, Z80, host::SimpleHost, opconsts::HALT_OPCODE};

const FIB_N: u8 = 24;

let mut host = SimpleHost::with_memory(&[
    0x21, 0x00, 0x00, // 0x0000 LD   HL, 0x0000
    0x11, 0x01, 0x00, // 0x0003 LD   DE, 0x0001
    0xEB,             // 0x0006 EX   DE, HL
    0x19,             // 0x0007 ADD  HL, DE
    0x10, 0xFC,       // 0x0008 DJNZ 0x0006
    HALT_OPCODE       // 0x000A HALT
]);
let mut cpu = Z80::default();
cpu.regs_mut().set_b(FIB_N);
while !cpu.is_halted() {
    cpu.step(&mut host);
}
assert_eq!(cpu.regs().hl(), 46368);
assert_eq!(host.t_states(), 10+10+(FIB_N as u64)*(4+11+13)-5+4);
```

## Logging

The crate uses the [log](https://docs.rs/log) facade. Each executed instruction is reported at the `trace`
level, decoder state transitions at `debug` and programs found on a tape at `info`.
*/
mod cpu;
pub mod disasm;
pub mod error;
pub mod host;
pub mod tape;
pub mod z80;

pub use cpu::*;
pub use host::{Clock, Hal, Io, Memory};
pub use z80::{Flavour, Z80};

/// An address of the NMI routine.
pub const NMI_RESTART: u16 = 0x66;
/// An address of the interrupt routine in interrupt mode 1.
pub const IM1_RESTART: u16 = 0x38;

/// Selected Z80 opcodes.
///
/// For example a convenient argument to the [Z80::irq] function
/// as the value present on the data bus.
pub mod opconsts {
    /// Bit operations opcode prefix.
    pub const CB_PREFIX     : u8 = 0xCB;
    /// Extended opcode prefix.
    pub const ED_PREFIX     : u8 = 0xED;
    /// [Prefix::Xdd][crate::Prefix::Xdd] prefix.
    pub const DD_PREFIX     : u8 = 0xDD;
    /// [Prefix::Yfd][crate::Prefix::Yfd] prefix.
    pub const FD_PREFIX     : u8 = 0xFD;
    /// No operation.
    pub const NOP_OPCODE    : u8 = 0x00;
    /// Halt execution.
    pub const HALT_OPCODE   : u8 = 0x76;
    /// Disable interrupts.
    pub const DI_OPCODE     : u8 = 0xF3;
    /// Enable interrupts.
    pub const EI_OPCODE     : u8 = 0xFB;
    /// Return from subroutine.
    pub const RET_OPCODE    : u8 = 0xC9;
    /// The officially documented `RETI` opcode.
    pub const RETI_OPCODE_T2: (u8, u8) = (ED_PREFIX, 0x4D);
    /// The officially documented `RETN` opcode.
    pub const RETN_OPCODE_T2: (u8, u8) = (ED_PREFIX, 0x45);
    /// Call a subroutine.
    pub const CALL_OPCODE   : u8 = 0xCD;
    /// Branch to an absolute address.
    pub const JP_OPCODE     : u8 = 0xC3;
    /// Branch to a relative address.
    pub const JR_OPCODE     : u8 = 0x18;
    /// Call a system subroutine at `0x00`.
    pub const RST_00H_OPCODE: u8 = 0xC7;
    /// Call a system subroutine at `0x08`.
    pub const RST_08H_OPCODE: u8 = 0xCF;
    /// Call a system subroutine at `0x10`.
    pub const RST_10H_OPCODE: u8 = 0xD7;
    /// Call a system subroutine at `0x18`.
    pub const RST_18H_OPCODE: u8 = 0xDF;
    /// Call a system subroutine at `0x20`.
    pub const RST_20H_OPCODE: u8 = 0xE7;
    /// Call a system subroutine at `0x28`.
    pub const RST_28H_OPCODE: u8 = 0xEF;
    /// Call a system subroutine at `0x30`.
    pub const RST_30H_OPCODE: u8 = 0xF7;
    /// Call a system subroutine at `0x38`.
    pub const RST_38H_OPCODE: u8 = 0xFF;
    /// Decrement `B` and branch to a relative address unless `B=0`.
    pub const DJNZ_OPCODE   : u8 = 0x10;
}

#[cfg(test)]
mod tests {
    use super::*;
    use disasm::disassemble;
    use opconsts::*;

    fn test_opcode(code: &[u8], matching: &str) {
        let dis = disassemble(0, code);
        assert_eq!(dis.len(), code.len(), "{}", matching);
        assert_eq!(dis.to_string_brief(), matching);
    }

    #[test]
    fn opconst_opcodes() {
        test_opcode(&[NOP_OPCODE],            "NOP");
        test_opcode(&[HALT_OPCODE],           "HALT");
        test_opcode(&[DI_OPCODE],             "DI");
        test_opcode(&[EI_OPCODE],             "EI");
        test_opcode(&[RET_OPCODE],            "RET");
        test_opcode(&[RETI_OPCODE_T2.0, RETI_OPCODE_T2.1], "RETI");
        test_opcode(&[RETN_OPCODE_T2.0, RETN_OPCODE_T2.1], "RETN");
        test_opcode(&[CALL_OPCODE, 0, 0],     "CALL 0000H");
        test_opcode(&[JP_OPCODE, 0, 0],       "JP 0000H");
        test_opcode(&[JR_OPCODE, 0],          "JR 0002H");
        test_opcode(&[RST_00H_OPCODE],        "RST 00H");
        test_opcode(&[RST_08H_OPCODE],        "RST 08H");
        test_opcode(&[RST_10H_OPCODE],        "RST 10H");
        test_opcode(&[RST_18H_OPCODE],        "RST 18H");
        test_opcode(&[RST_20H_OPCODE],        "RST 20H");
        test_opcode(&[RST_28H_OPCODE],        "RST 28H");
        test_opcode(&[RST_30H_OPCODE],        "RST 30H");
        test_opcode(&[RST_38H_OPCODE],        "RST 38H");
        test_opcode(&[DJNZ_OPCODE, 0xFE],     "DJNZ 0000H");
        test_opcode(&[CB_PREFIX, 0x7E],       "BIT 7,(HL)");
        test_opcode(&[DD_PREFIX, 0x21, 0x34, 0x12], "LD IX,1234H");
        test_opcode(&[FD_PREFIX, CB_PREFIX, 0xFE, 0xC6], "SET 0,(IY-02H)");
    }
}
