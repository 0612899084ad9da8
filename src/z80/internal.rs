/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Private methods shared by the instruction implementations.
//!
//! The comments next to the bus helpers list the cycles as `address:T-states`,
//! e.g. `pc:3, pc+1:3` or `ir:1 x 7` for 7 internal cycles with `IR` on the address bus.
use super::*;

/// Determines the direction of the block instruction group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum BlockDelta {
    Increase,
    Decrease
}

impl BlockDelta {
    /// Bit 3 of the block instruction op-code selects the direction.
    #[inline]
    pub(super) fn from_code(code: u8) -> Self {
        if code & 0b0000_1000 == 0 {
            BlockDelta::Increase
        }
        else {
            BlockDelta::Decrease
        }
    }

    #[inline]
    pub(super) fn apply(self, val: u16) -> u16 {
        match self {
            BlockDelta::Increase => val.wrapping_add(1),
            BlockDelta::Decrease => val.wrapping_sub(1),
        }
    }
}

/// Bit 4 of the block instruction op-code selects the repeating variant.
#[inline]
pub(super) fn is_block_repeat(code: u8) -> bool {
    code & 0b0001_0000 != 0
}

impl Z80 {
    #[inline]
    pub(super) fn flags(&self) -> CpuFlags {
        self.regs.flags()
    }

    /// Sets the Flags register and marks the Flags as modified by the current instruction.
    #[inline]
    pub(super) fn set_flags(&mut self, flags: CpuFlags) {
        self.regs.set_flags(flags);
        self.q.flags_modified();
    }

    /// Applies `op` to the Flags register.
    #[inline]
    pub(super) fn with_flags<R, F: FnOnce(&mut CpuFlags) -> R>(&mut self, op: F) -> R {
        let mut flags = self.flags();
        let res = op(&mut flags);
        self.set_flags(flags);
        res
    }

    #[inline]
    pub(super) fn ir_cycles(&mut self, hal: &mut dyn Hal, count: u32) {
        hal.add_no_mreq(self.regs.ir(), count);
    }

    /// Reads 1 byte via PC. Increases PC afterwards.
    #[inline]
    pub(super) fn fetch_imm8(&mut self, hal: &mut dyn Hal) -> u8 {
        // pc:3
        let pc = self.regs.pc();
        let val = hal.read_mreq(pc);
        self.regs.set_pc(pc.wrapping_add(1));
        val
    }

    /// Reads 1 byte via PC followed by `extra` internal cycles at the same address.
    #[inline]
    pub(super) fn fetch_imm8_ext(&mut self, hal: &mut dyn Hal, extra: u32) -> u8 {
        // pc:3, pc:1 x extra
        let pc = self.regs.pc();
        let val = hal.read_mreq(pc);
        hal.add_no_mreq(pc, extra);
        self.regs.set_pc(pc.wrapping_add(1));
        val
    }

    /// Reads 2 bytes via PC. Increases PC afterwards.
    #[inline]
    pub(super) fn fetch_imm16(&mut self, hal: &mut dyn Hal) -> u16 {
        // pc:3, pc+1:3
        let lo = self.fetch_imm8(hal);
        let hi = self.fetch_imm8(hal);
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub(super) fn read_mem16(&mut self, hal: &mut dyn Hal, addr: u16) -> u16 {
        // addr:3, addr+1:3
        let lo = hal.read_mreq(addr);
        let hi = hal.read_mreq(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    #[inline]
    pub(super) fn write_mem16(&mut self, hal: &mut dyn Hal, addr: u16, val: u16) {
        // addr:3, addr+1:3
        let [lo, hi] = val.to_le_bytes();
        hal.write_mreq(addr, lo);
        hal.write_mreq(addr.wrapping_add(1), hi);
    }

    #[inline]
    pub(super) fn push2(&mut self, hal: &mut dyn Hal, vhi: u8, vlo: u8) {
        // sp-1:3, sp-2:3
        let sp = self.regs.sp().wrapping_sub(1);
        hal.write_mreq(sp, vhi);
        let sp = sp.wrapping_sub(1);
        hal.write_mreq(sp, vlo);
        self.regs.set_sp(sp);
    }

    #[inline]
    pub(super) fn push16(&mut self, hal: &mut dyn Hal, val: u16) {
        let [vlo, vhi] = val.to_le_bytes();
        self.push2(hal, vhi, vlo);
    }

    #[inline]
    pub(super) fn pop16(&mut self, hal: &mut dyn Hal) -> u16 {
        // sp:3, sp+1:3
        let sp = self.regs.sp();
        let val = self.read_mem16(hal, sp);
        self.regs.set_sp(sp.wrapping_add(2));
        val
    }

    /// Pops the return address, sets PC and MEMPTR.
    #[inline]
    pub(super) fn ret(&mut self, hal: &mut dyn Hal) {
        let pc = self.pop16(hal);
        self.regs.set_pc(pc);
        self.regs.set_memptr(pc);
    }

    /// Pushes PC and jumps to `addr`.
    #[inline]
    pub(super) fn call(&mut self, hal: &mut dyn Hal, addr: u16) {
        let pc = self.regs.pc();
        self.push16(hal, pc);
        self.regs.set_pc(addr);
        self.regs.set_memptr(addr);
    }

    /// Jumps relative to PC after an already fetched displacement byte,
    /// spending 5 internal cycles at the address of that byte.
    #[inline]
    pub(super) fn jump_relative(&mut self, hal: &mut dyn Hal, e: u8) {
        // pc-1:1 x 5
        let pc = self.regs.pc();
        hal.add_no_mreq(pc.wrapping_sub(1), 5);
        let pc = pc.wrapping_add(e as i8 as i16 as u16);
        self.regs.set_pc(pc);
        self.regs.set_memptr(pc);
    }

    /// Returns the content of `HL`, `IX` or `IY` depending on the current prefix.
    #[inline]
    pub(super) fn hl_or_index(&self) -> u16 {
        self.regs.reg16(Reg16::HL, self.prefix)
    }

    #[inline]
    pub(super) fn set_hl_or_index(&mut self, val: u16) {
        self.regs.hl_or_index(self.prefix).set16(val)
    }

    /// Returns the address of the memory operand: `HL` without a prefix, otherwise reads the
    /// displacement and returns `IX+d` or `IY+d`, setting MEMPTR.
    ///
    /// For the index variants `extra` internal cycles are spent at the address of the displacement byte.
    #[inline]
    pub(super) fn memory_operand_addr(&mut self, hal: &mut dyn Hal, extra: u32) -> u16 {
        match self.prefix {
            None => self.regs.hl(),
            Some(prefix) => {
                // pc:3, pc:1 x extra
                let d = self.fetch_imm8_ext(hal, extra);
                let addr = self.index_displaced(prefix, d);
                self.regs.set_memptr(addr);
                addr
            }
        }
    }

    #[inline]
    pub(super) fn index_displaced(&self, prefix: Prefix, d: u8) -> u16 {
        self.regs.reg16(Reg16::HL, Some(prefix)).wrapping_add(d as i8 as i16 as u16)
    }

    /// Reads the value, applies `op` to it and writes it back.
    /// `(HL)` cycles: `hl:3, hl:1, hl(write):3`.
    #[inline]
    pub(super) fn read_modify_write<F: FnOnce(&mut Self, u8) -> u8>(&mut self, hal: &mut dyn Hal, addr: u16, op: F) -> u8 {
        let val = hal.read_mreq(addr);
        hal.add_no_mreq(addr, 1);
        let res = op(self, val);
        hal.write_mreq(addr, res);
        res
    }

    /// Executes `ADD`, `ADC` or `SBC` on `HL`, `IX` or `IY`.
    #[inline]
    pub(super) fn op16<F: FnOnce(u16, u16, &mut CpuFlags) -> u16>(&mut self, hal: &mut dyn Hal, rr: Reg16, op: F) {
        // ir:1 x 7
        self.ir_cycles(hal, 7);
        let prefix = self.prefix;
        let hl = self.regs.reg16(Reg16::HL, prefix);
        let val = self.regs.reg16(rr, prefix);
        self.regs.set_memptr(hl.wrapping_add(1));
        let res = self.with_flags(|flags| op(hl, val, flags));
        self.regs.set_reg16(Reg16::HL, prefix, res);
    }

    /// Returns the `SCF`/`CCF` source of the undocumented Flags.
    #[inline]
    pub(super) fn q(&self) -> u8 {
        self.flavour.get_q(self.q, self.regs.a(), self.flags())
    }

    /// Called when the instruction executor reached the code without a proper implementation.
    #[cold]
    pub(super) fn unimplemented(&mut self, code: u8) {
        log::warn!(target: TRACE_TARGET, "no implementation for the op-code {:02X} at {:04X}H",
                   code, self.regs.pc().wrapping_sub(1));
    }
}
