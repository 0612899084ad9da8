/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Implementations of all the Z80 instructions.
//!
//! Each function is an executor of a group of instructions sharing the same op-code layout.
//! The operands are parsed from the op-code given as the last argument, the same way the
//! [instruction tables][super::table] select the executor.
//!
//! The op-code (and the prefixes) have been already fetched when an executor is called
//! and PC points to the next byte after the op-code.
//!
//! All flag modifying operations are delegated to the functions in the [ops][super::ops] module.
use core::mem::swap;
use super::*;
use super::internal::{BlockDelta, is_block_repeat};

/********************************** PREFIXES *********************************/

/// `0xDD` and `0xFD`. The last prefix wins.
pub(super) fn prefix_index(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    cpu.prefix = Prefix::from_code(code);
}

/// `0xED`, also after an index prefix which is then being ignored.
pub(super) fn prefix_ed(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:4
    cpu.prefix = None;
    let code = fetch_opcode(cpu, hal);
    (table::ED[code as usize].exec)(cpu, hal, code)
}

/// `0xCB`, `0xDD 0xCB d op` and `0xFD 0xCB d op`.
///
/// With an index prefix both the displacement and the final op-code are read as ordinary memory reads
/// and MEMPTR holds the effective address when the final executor is called.
pub(super) fn prefix_cb(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    let Some(prefix) = cpu.prefix else {
        // pc:4
        let code = fetch_opcode(cpu, hal);
        return (table::CB[code as usize].exec)(cpu, hal, code)
    };
    // pc:3, pc+1:3, pc+1:1 x 2
    let d = cpu.fetch_imm8(hal);
    let code = cpu.fetch_imm8_ext(hal, 2);
    let addr = cpu.index_displaced(prefix, d);
    cpu.regs.set_memptr(addr);
    (table::INDEX_CB[code as usize].exec)(cpu, hal, code)
}

#[inline]
fn fetch_opcode(cpu: &mut Z80, hal: &mut dyn Hal) -> u8 {
    let pc = cpu.regs.pc();
    let code = hal.fetch_m1(pc);
    cpu.regs.inc_r();
    cpu.regs.set_pc(pc.wrapping_add(1));
    code
}

/********************************** CONTROL **********************************/

pub(super) fn nop(_cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {}

/// An undefined `0xED` op-code.
pub(super) fn noni(_cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {}

pub(super) fn halt(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    cpu.regs.halted = true;
    let pc = cpu.regs.pc().wrapping_sub(1);
    cpu.regs.set_pc(pc);
}

pub(super) fn di(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    cpu.regs.set_iffs(false, false);
}

pub(super) fn ei(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    cpu.regs.set_iffs(true, true);
    cpu.last_ei = true;
}

pub(super) fn im(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let mode = match parse_interrupt_mode(code) {
        1 => InterruptMode::Mode1,
        2 => InterruptMode::Mode2,
        _ => InterruptMode::Mode0
    };
    cpu.regs.set_im(mode);
}

/****************************** JUMPS AND CALLS ******************************/

pub(super) fn jp(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, pc+1:3
    let nn = cpu.fetch_imm16(hal);
    cpu.regs.set_pc(nn);
    cpu.regs.set_memptr(nn);
}

pub(super) fn jp_cc(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, pc+1:3
    let nn = cpu.fetch_imm16(hal);
    cpu.regs.set_memptr(nn);
    if Condition::from(code).is_satisfied(cpu.flags()) {
        cpu.regs.set_pc(nn);
    }
}

/// `JP (HL)`, `JP (IX)`, `JP (IY)`.
pub(super) fn jp_hl(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let pc = cpu.hl_or_index();
    cpu.regs.set_pc(pc);
}

pub(super) fn jr(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, pc:1 x 5
    let e = cpu.fetch_imm8(hal);
    cpu.jump_relative(hal, e);
}

pub(super) fn jr_cc(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, [pc:1 x 5]
    let e = cpu.fetch_imm8(hal);
    if Condition::from_jr_subset(code).is_satisfied(cpu.flags()) {
        cpu.jump_relative(hal, e);
    }
}

pub(super) fn djnz(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1, pc:3, [pc:1 x 5]
    cpu.ir_cycles(hal, 1);
    let e = cpu.fetch_imm8(hal);
    let b = cpu.regs.b().wrapping_sub(1);
    cpu.regs.set_b(b);
    if b != 0 {
        cpu.jump_relative(hal, e);
    }
}

pub(super) fn call(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, pc+1:3, pc+1:1, sp-1:3, sp-2:3
    let nn = cpu.fetch_imm16(hal);
    hal.add_no_mreq(cpu.regs.pc().wrapping_sub(1), 1);
    cpu.call(hal, nn);
}

pub(super) fn call_cc(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, pc+1:3, [pc+1:1, sp-1:3, sp-2:3]
    let nn = cpu.fetch_imm16(hal);
    cpu.regs.set_memptr(nn);
    if Condition::from(code).is_satisfied(cpu.flags()) {
        hal.add_no_mreq(cpu.regs.pc().wrapping_sub(1), 1);
        cpu.call(hal, nn);
    }
}

pub(super) fn ret(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // sp:3, sp+1:3
    cpu.ret(hal);
}

pub(super) fn ret_cc(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1, [sp:3, sp+1:3]
    cpu.ir_cycles(hal, 1);
    if Condition::from(code).is_satisfied(cpu.flags()) {
        cpu.ret(hal);
    }
}

/// `RETN` and `RETI`, both restore `IFF1` from `IFF2`.
pub(super) fn retn(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // sp:3, sp+1:3
    cpu.regs.iff1 = cpu.regs.iff2;
    cpu.ret(hal);
}

pub(super) fn rst(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1, sp-1:3, sp-2:3
    cpu.ir_cycles(hal, 1);
    cpu.call(hal, parse_restart_address(code));
}

/******************************** EXCHANGES **********************************/

pub(super) fn ex_af(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    cpu.regs.ex_af();
}

pub(super) fn exx(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    cpu.regs.exx();
}

/// `EX DE,HL` is never affected by the index prefix.
pub(super) fn ex_de_hl(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    swap(&mut cpu.regs.de, &mut cpu.regs.hl);
}

pub(super) fn ex_sp_hl(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // sp:3, sp+1:3, sp+1:1, sp+1(write):3, sp(write):3, sp(write):1 x 2
    let sp = cpu.regs.sp();
    let sp1 = sp.wrapping_add(1);
    let lo = hal.read_mreq(sp);
    let hi = hal.read_mreq(sp1);
    hal.add_no_mreq(sp1, 1);
    let [vlo, vhi] = cpu.hl_or_index().to_le_bytes();
    hal.write_mreq(sp1, vhi);
    hal.write_mreq(sp, vlo);
    hal.add_no_mreq(sp, 2);
    let val = u16::from_le_bytes([lo, hi]);
    cpu.set_hl_or_index(val);
    cpu.regs.set_memptr(val);
}

/********************************* 8-BIT LOADS *******************************/

/// `LD r,r'`. With an index prefix `H` and `L` on both sides are the index register halves.
pub(super) fn ld_r_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let (Some(dst), Some(src)) = (Reg8::from_b5_3(code), Reg8::from_b2_0(code)) else {
        return cpu.unimplemented(code)
    };
    let prefix = cpu.prefix;
    let val = cpu.regs.reg8(src, prefix);
    cpu.regs.set_reg8(dst, prefix, val);
}

pub(super) fn ld_r_n(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3
    let Some(dst) = Reg8::from_b5_3(code) else {
        return cpu.unimplemented(code)
    };
    let n = cpu.fetch_imm8(hal);
    let prefix = cpu.prefix;
    cpu.regs.set_reg8(dst, prefix, n);
}

/// `LD r,(HL)`, `LD r,(IX+d)`, `LD r,(IY+d)`. The destination is never an index register half.
pub(super) fn ld_r_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3 | pc:3, pc:1 x 5, ii+d:3
    let Some(dst) = Reg8::from_b5_3(code) else {
        return cpu.unimplemented(code)
    };
    let addr = cpu.memory_operand_addr(hal, 5);
    let val = hal.read_mreq(addr);
    cpu.regs.set_reg8(dst, None, val);
}

/// `LD (HL),r`, `LD (IX+d),r`, `LD (IY+d),r`. The source is never an index register half.
pub(super) fn ld_mem_r(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3 | pc:3, pc:1 x 5, ii+d:3
    let Some(src) = Reg8::from_b2_0(code) else {
        return cpu.unimplemented(code)
    };
    let addr = cpu.memory_operand_addr(hal, 5);
    let val = cpu.regs.reg8(src, None);
    hal.write_mreq(addr, val);
}

pub(super) fn ld_mem_n(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, hl:3 | pc:3, pc+1:3, pc+1:1 x 2, ii+d:3
    let addr = match cpu.prefix {
        None => cpu.regs.hl(),
        Some(prefix) => {
            let d = cpu.fetch_imm8(hal);
            let addr = cpu.index_displaced(prefix, d);
            cpu.regs.set_memptr(addr);
            addr
        }
    };
    let n = if cpu.prefix.is_some() {
        cpu.fetch_imm8_ext(hal, 2)
    }
    else {
        cpu.fetch_imm8(hal)
    };
    hal.write_mreq(addr, n);
}

/// `LD A,(BC)`, `LD A,(DE)`.
pub(super) fn ld_a_rp(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // rr:3
    let addr = cpu.regs.reg16(Reg16::from(code), None);
    let val = hal.read_mreq(addr);
    cpu.regs.set_a(val);
    cpu.regs.set_memptr(addr.wrapping_add(1));
}

/// `LD (BC),A`, `LD (DE),A`.
pub(super) fn ld_rp_a(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // rr:3
    let addr = cpu.regs.reg16(Reg16::from(code), None);
    let a = cpu.regs.a();
    hal.write_mreq(addr, a);
    let (hi, lo) = cpu.flavour.memptr_mix(a, addr as u8);
    cpu.regs.memptr.set(hi, lo);
}

pub(super) fn ld_a_nn(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, pc+1:3, nn:3
    let nn = cpu.fetch_imm16(hal);
    let val = hal.read_mreq(nn);
    cpu.regs.set_a(val);
    cpu.regs.set_memptr(nn.wrapping_add(1));
}

pub(super) fn ld_nn_a(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, pc+1:3, nn:3
    let nn = cpu.fetch_imm16(hal);
    let a = cpu.regs.a();
    hal.write_mreq(nn, a);
    let (hi, lo) = cpu.flavour.memptr_mix(a, nn as u8);
    cpu.regs.memptr.set(hi, lo);
}

/// `LD A,I`.
pub(super) fn ld_a_i(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1
    cpu.ir_cycles(hal, 1);
    let i = cpu.regs.i();
    ld_a_ir(cpu, i);
}

/// `LD A,R`.
pub(super) fn ld_a_r(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1
    cpu.ir_cycles(hal, 1);
    let r = cpu.regs.r();
    ld_a_ir(cpu, r);
}

#[inline]
fn ld_a_ir(cpu: &mut Z80, val: u8) {
    cpu.regs.set_a(val);
    let iff2 = cpu.regs.iff2;
    cpu.with_flags(|flags| ops::ld_a_ir(val, iff2, flags));
}

pub(super) fn ld_i_a(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1
    cpu.ir_cycles(hal, 1);
    let a = cpu.regs.a();
    cpu.regs.set_i(a);
}

pub(super) fn ld_r_a(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1
    cpu.ir_cycles(hal, 1);
    let a = cpu.regs.a();
    cpu.regs.set_r(a);
}

/******************************** 16-BIT LOADS *******************************/

pub(super) fn ld_rp_nn(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, pc+1:3
    let nn = cpu.fetch_imm16(hal);
    let prefix = cpu.prefix;
    cpu.regs.set_reg16(Reg16::from(code), prefix, nn);
}

/// `LD HL,(nn)`, `LD IX,(nn)`, `LD IY,(nn)` and `LD rr,(nn)` of the `0xED` group.
pub(super) fn ld_rp_mem_nn(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, pc+1:3, nn:3, nn+1:3
    let nn = cpu.fetch_imm16(hal);
    let val = cpu.read_mem16(hal, nn);
    let prefix = cpu.prefix;
    cpu.regs.set_reg16(Reg16::from(code), prefix, val);
    cpu.regs.set_memptr(nn.wrapping_add(1));
}

/// `LD (nn),HL`, `LD (nn),IX`, `LD (nn),IY` and `LD (nn),rr` of the `0xED` group.
pub(super) fn ld_mem_nn_rp(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3, pc+1:3, nn:3, nn+1:3
    let nn = cpu.fetch_imm16(hal);
    let val = cpu.regs.reg16(Reg16::from(code), cpu.prefix);
    cpu.write_mem16(hal, nn, val);
    cpu.regs.set_memptr(nn.wrapping_add(1));
}

pub(super) fn ld_sp_hl(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // ir:1 x 2
    cpu.ir_cycles(hal, 2);
    let val = cpu.hl_or_index();
    cpu.regs.set_sp(val);
}

pub(super) fn push(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1, sp-1:3, sp-2:3
    cpu.ir_cycles(hal, 1);
    let (vhi, vlo) = cpu.regs.stk_reg16(StkReg16::from(code), cpu.prefix);
    cpu.push2(hal, vhi, vlo);
}

pub(super) fn pop(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // sp:3, sp+1:3
    let [vlo, vhi] = cpu.pop16(hal).to_le_bytes();
    let prefix = cpu.prefix;
    cpu.regs.set_stk_reg16(StkReg16::from(code), prefix, vhi, vlo);
}

/****************************** 8-BIT ARITHMETIC *****************************/

pub(super) fn alu_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let Some(src) = Reg8::from_b2_0(code) else {
        return cpu.unimplemented(code)
    };
    let val = cpu.regs.reg8(src, cpu.prefix);
    alu(cpu, code, val);
}

pub(super) fn alu_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3 | pc:3, pc:1 x 5, ii+d:3
    let addr = cpu.memory_operand_addr(hal, 5);
    let val = hal.read_mreq(addr);
    alu(cpu, code, val);
}

pub(super) fn alu_n(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // pc:3
    let val = cpu.fetch_imm8(hal);
    alu(cpu, code, val);
}

#[inline]
fn alu(cpu: &mut Z80, code: u8, val: u8) {
    let acc = cpu.regs.a();
    let res = cpu.with_flags(|flags| ops::alu8(Ops8::from(code), acc, val, flags));
    cpu.regs.set_a(res);
}

/// `INC r` and `DEC r`, selected by bit 0 of the op-code.
pub(super) fn inc_dec_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let Some(reg) = Reg8::from_b5_3(code) else {
        return cpu.unimplemented(code)
    };
    let prefix = cpu.prefix;
    let val = cpu.regs.reg8(reg, prefix);
    let res = cpu.with_flags(|flags| inc_dec8(code, val, flags));
    cpu.regs.set_reg8(reg, prefix, res);
}

/// `INC (HL)`, `DEC (HL)` and their index variants.
pub(super) fn inc_dec_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1, hl(write):3 | pc:3, pc:1 x 5, ii+d:3, ii+d:1, ii+d(write):3
    let addr = cpu.memory_operand_addr(hal, 5);
    cpu.read_modify_write(hal, addr, |cpu, val| {
        cpu.with_flags(|flags| inc_dec8(code, val, flags))
    });
}

#[inline]
fn inc_dec8(code: u8, val: u8, flags: &mut CpuFlags) -> u8 {
    if code & 1 == 0 {
        ops::inc(val, flags)
    }
    else {
        ops::dec(val, flags)
    }
}

pub(super) fn neg(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let acc = cpu.regs.a();
    let res = cpu.with_flags(|flags| ops::neg(acc, flags));
    cpu.regs.set_a(res);
}

pub(super) fn daa(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let acc = cpu.regs.a();
    let res = cpu.with_flags(|flags| ops::daa(acc, flags));
    cpu.regs.set_a(res);
}

pub(super) fn cpl(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let acc = cpu.regs.a();
    let res = cpu.with_flags(|flags| ops::cpl(acc, flags));
    cpu.regs.set_a(res);
}

pub(super) fn scf(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let q = cpu.q();
    cpu.with_flags(|flags| ops::scf(q, flags));
}

pub(super) fn ccf(cpu: &mut Z80, _hal: &mut dyn Hal, _code: u8) {
    let q = cpu.q();
    cpu.with_flags(|flags| ops::ccf(q, flags));
}

/****************************** 16-BIT ARITHMETIC ****************************/

pub(super) fn add_hl_rp(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1 x 7
    cpu.op16(hal, Reg16::from(code), ops::add16);
}

/// `SBC HL,rr` and `ADC HL,rr`, selected by bit 3 of the op-code.
pub(super) fn sbc_adc_hl_rp(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1 x 7
    if code & 0b0000_1000 == 0 {
        cpu.op16(hal, Reg16::from(code), ops::sbc16);
    }
    else {
        cpu.op16(hal, Reg16::from(code), ops::adc16);
    }
}

/// `INC rr` and `DEC rr`, selected by bit 3 of the op-code.
pub(super) fn inc_dec_rp(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1 x 2
    cpu.ir_cycles(hal, 2);
    let reg = Reg16::from(code);
    let prefix = cpu.prefix;
    let val = cpu.regs.reg16(reg, prefix);
    let res = if code & 0b0000_1000 == 0 {
        val.wrapping_add(1)
    }
    else {
        val.wrapping_sub(1)
    };
    cpu.regs.set_reg16(reg, prefix, res);
}

/***************************** ROTATES AND SHIFTS ****************************/

/// `RLCA`, `RRCA`, `RLA` and `RRA`.
pub(super) fn rot_acc(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let acc = cpu.regs.a();
    let res = cpu.with_flags(|flags| match Rot::from(code) {
        Rot::RLC => ops::rlca(acc, flags),
        Rot::RRC => ops::rrca(acc, flags),
        Rot::RL  => ops::rla(acc, flags),
        _        => ops::rra(acc, flags),
    });
    cpu.regs.set_a(res);
}

pub(super) fn rot_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let Some(reg) = Reg8::from_b2_0(code) else {
        return cpu.unimplemented(code)
    };
    let val = cpu.regs.reg8(reg, None);
    let res = cpu.with_flags(|flags| ops::rot(Rot::from(code), val, flags));
    cpu.regs.set_reg8(reg, None, res);
}

pub(super) fn rot_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1, hl(write):3
    let addr = cpu.regs.hl();
    cpu.read_modify_write(hal, addr, |cpu, val| {
        cpu.with_flags(|flags| ops::rot(Rot::from(code), val, flags))
    });
}

/// `RLD` and `RRD`, selected by bit 3 of the op-code.
pub(super) fn rxd(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1 x 4, hl(write):3
    let hl = cpu.regs.hl();
    cpu.regs.set_memptr(hl.wrapping_add(1));
    let val = hal.read_mreq(hl);
    hal.add_no_mreq(hl, 4);
    let acc = cpu.regs.a();
    let (acc, val) = cpu.with_flags(|flags| if code & 0b0000_1000 == 0 {
        ops::rrd(acc, val, flags)
    }
    else {
        ops::rld(acc, val, flags)
    });
    hal.write_mreq(hl, val);
    cpu.regs.set_a(acc);
}

/******************************** BIT OPERATIONS *****************************/

pub(super) fn bit_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let Some(reg) = Reg8::from_b2_0(code) else {
        return cpu.unimplemented(code)
    };
    let val = cpu.regs.reg8(reg, None);
    cpu.with_flags(|flags| ops::bit(parse_code_bitnum(code), val, val, flags));
}

/// `BIT n,(HL)`: bits 3 and 5 of the Flags come from the high byte of MEMPTR.
pub(super) fn bit_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1
    let hl = cpu.regs.hl();
    let val = hal.read_mreq(hl);
    hal.add_no_mreq(hl, 1);
    let xy = cpu.regs.memptr.get8hi();
    cpu.with_flags(|flags| ops::bit(parse_code_bitnum(code), val, xy, flags));
}

/// `RES n,r` and `SET n,r`, selected by bit 6 of the op-code.
pub(super) fn res_set_r(cpu: &mut Z80, _hal: &mut dyn Hal, code: u8) {
    let Some(reg) = Reg8::from_b2_0(code) else {
        return cpu.unimplemented(code)
    };
    let val = cpu.regs.reg8(reg, None);
    cpu.regs.set_reg8(reg, None, res_set(code, val));
}

pub(super) fn res_set_mem(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1, hl(write):3
    let addr = cpu.regs.hl();
    cpu.read_modify_write(hal, addr, |_, val| res_set(code, val));
}

#[inline]
fn res_set(code: u8, val: u8) -> u8 {
    let n = parse_code_bitnum(code);
    if code & 0b0100_0000 == 0 {
        ops::res(n, val)
    }
    else {
        ops::set(n, val)
    }
}

/// `BIT n,(IX+d)`: bits 3 and 5 of the Flags come from the high byte of the address.
pub(super) fn index_bit(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ii+d:3, ii+d:1
    let addr = cpu.regs.memptr();
    let val = hal.read_mreq(addr);
    hal.add_no_mreq(addr, 1);
    cpu.with_flags(|flags| ops::bit(parse_code_bitnum(code), val, (addr >> 8) as u8, flags));
}

/// Shifts, rotations, `RES` and `SET` on `(IX+d)`.
///
/// Unless bits 0..=2 of the op-code are `0b110` the result is also copied to the register
/// (never an index register half).
pub(super) fn index_rot_res_set(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ii+d:3, ii+d:1, ii+d(write):3
    let addr = cpu.regs.memptr();
    let res = cpu.read_modify_write(hal, addr, |cpu, val| {
        if code & 0b1100_0000 == 0 {
            cpu.with_flags(|flags| ops::rot(Rot::from(code), val, flags))
        }
        else {
            res_set(code, val)
        }
    });
    if let Some(reg) = Reg8::from_b2_0(code) {
        cpu.regs.set_reg8(reg, None, res);
    }
}

/************************************ I/O ************************************/

pub(super) fn in_a_n(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, IO
    let n = cpu.fetch_imm8(hal);
    let port = u16::from_be_bytes([cpu.regs.a(), n]);
    let val = hal.read_io(port);
    cpu.regs.set_a(val);
    cpu.regs.set_memptr(port.wrapping_add(1));
}

pub(super) fn out_n_a(cpu: &mut Z80, hal: &mut dyn Hal, _code: u8) {
    // pc:3, IO
    let n = cpu.fetch_imm8(hal);
    let a = cpu.regs.a();
    hal.write_io(u16::from_be_bytes([a, n]), a);
    let (hi, lo) = cpu.flavour.memptr_mix(a, n);
    cpu.regs.memptr.set(hi, lo);
}

/// `IN r,(C)`. The `0b110` register encoding only sets the Flags.
pub(super) fn in_r_c(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // IO
    let bc = cpu.regs.bc();
    let val = hal.read_io(bc);
    cpu.regs.set_memptr(bc.wrapping_add(1));
    cpu.with_flags(|flags| ops::io(val, flags));
    if let Some(reg) = Reg8::from_b5_3(code) {
        cpu.regs.set_reg8(reg, None, val);
    }
}

/// `OUT (C),r`. The `0b110` register encoding outputs a constant depending on the flavour.
pub(super) fn out_c_r(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // IO
    let bc = cpu.regs.bc();
    let val = match Reg8::from_b5_3(code) {
        Some(reg) => cpu.regs.reg8(reg, None),
        None => cpu.flavour.constant_out_data()
    };
    hal.write_io(bc, val);
    cpu.regs.set_memptr(bc.wrapping_add(1));
}

/***************************** BLOCK INSTRUCTIONS ****************************/

/// Repeats the current block instruction: PC moves back to the `0xED` prefix.
#[inline]
fn block_repeat(cpu: &mut Z80) {
    let pc = cpu.regs.pc().wrapping_sub(2);
    cpu.regs.set_pc(pc);
    cpu.regs.set_memptr(pc.wrapping_add(1));
}

/// `LDI`, `LDD`, `LDIR`, `LDDR`.
pub(super) fn ldx(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, de(write):3, de:1 x 2, [de:1 x 5]
    let delta = BlockDelta::from_code(code);
    let hl = cpu.regs.hl();
    let de = cpu.regs.de();
    let val = hal.read_mreq(hl);
    hal.write_mreq(de, val);
    hal.add_no_mreq(de, 2);
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);
    let acc = cpu.regs.a();
    cpu.with_flags(|flags| ops::ldx(acc, val, bc == 0, flags));
    if is_block_repeat(code) && bc != 0 {
        hal.add_no_mreq(de, 5);
        block_repeat(cpu);
    }
    cpu.regs.set_hl(delta.apply(hl));
    cpu.regs.set_de(delta.apply(de));
}

/// `CPI`, `CPD`, `CPIR`, `CPDR`.
pub(super) fn cpx(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // hl:3, hl:1 x 5, [hl:1 x 5]
    let delta = BlockDelta::from_code(code);
    let hl = cpu.regs.hl();
    let val = hal.read_mreq(hl);
    hal.add_no_mreq(hl, 5);
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);
    let acc = cpu.regs.a();
    let done = cpu.with_flags(|flags| ops::cpx(acc, val, bc == 0, flags));
    if is_block_repeat(code) && !done {
        hal.add_no_mreq(hl, 5);
        block_repeat(cpu);
    }
    else {
        let memptr = delta.apply(cpu.regs.memptr());
        cpu.regs.set_memptr(memptr);
    }
    cpu.regs.set_hl(delta.apply(hl));
}

/// `INI`, `IND`, `INIR`, `INDR`.
pub(super) fn inx(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1, IO, hl(write):3, [hl:1 x 5]
    let delta = BlockDelta::from_code(code);
    cpu.ir_cycles(hal, 1);
    let bc = cpu.regs.bc();
    let val = hal.read_io(bc);
    let hl = cpu.regs.hl();
    hal.write_mreq(hl, val);
    cpu.regs.set_memptr(delta.apply(bc));
    let b = cpu.regs.b().wrapping_sub(1);
    cpu.regs.set_b(b);
    let m = delta.apply(bc) as u8;
    cpu.with_flags(|flags| ops::iox(val, b, m, flags));
    if is_block_repeat(code) && b != 0 {
        hal.add_no_mreq(hl, 5);
        block_repeat(cpu);
    }
    cpu.regs.set_hl(delta.apply(hl));
}

/// `OUTI`, `OUTD`, `OTIR`, `OTDR`.
pub(super) fn outx(cpu: &mut Z80, hal: &mut dyn Hal, code: u8) {
    // ir:1, hl:3, IO, [bc:1 x 5]
    let delta = BlockDelta::from_code(code);
    cpu.ir_cycles(hal, 1);
    let hl = cpu.regs.hl();
    let val = hal.read_mreq(hl);
    let b = cpu.regs.b().wrapping_sub(1);
    cpu.regs.set_b(b);
    let bc = cpu.regs.bc();
    cpu.regs.set_memptr(delta.apply(bc));
    hal.write_io(bc, val);
    let hl = delta.apply(hl);
    cpu.regs.set_hl(hl);
    cpu.with_flags(|flags| ops::iox(val, b, hl as u8, flags));
    if is_block_repeat(code) && b != 0 {
        hal.add_no_mreq(bc, 5);
        block_repeat(cpu);
    }
}
