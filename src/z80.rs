/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! A home of the Cpu implementation.
mod flavours;
mod internal;
mod instructions;
pub mod ops;
pub mod table;

use log::{log_enabled, trace, Level};
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::cpu::*;
use crate::host::{BusCycles, Clock, Hal, Memory};
use crate::disasm;
use table::MAX_INSTRUCTION_LEN;

pub use flavours::*;

/// The log target of the instruction trace.
pub const TRACE_TARGET: &str = "trs80emu::z80";

/// The Z80 interpreter.
///
/// The Cpu owns only its registers. Memory, I/O and the T-states clock are provided by
/// the host on each call via the [Hal] trait object.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Z80 {
    regs: RegisterSet,
    flavour: Flavour,
    q: QLatch,
    last_ei: bool,
    prefix: Option<Prefix>,
}

impl Default for Z80 {
    fn default() -> Self {
        Z80::new()
    }
}

impl Z80 {
    /// Creates a new instance of the NMOS Z80 with the state just after `RESET`.
    pub fn new() -> Self {
        Z80::with_flavour(Flavour::default())
    }

    /// Creates a new instance with the state just after `RESET` and the given `flavour`.
    pub fn with_flavour(flavour: Flavour) -> Self {
        Z80 {
            regs: RegisterSet::new(),
            flavour,
            q: QLatch::default(),
            last_ei: false,
            prefix: None,
        }
    }

    /// Resets the Cpu as if the `RESET` signal was asserted. The flavour is preserved.
    pub fn reset(&mut self) {
        *self = Z80::with_flavour(self.flavour);
    }

    #[inline]
    pub fn regs(&self) -> &RegisterSet {
        &self.regs
    }

    #[inline]
    pub fn regs_mut(&mut self) -> &mut RegisterSet {
        &mut self.regs
    }

    #[inline]
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    #[inline]
    pub fn set_flavour(&mut self, flavour: Flavour) {
        self.flavour = flavour;
    }

    /// Returns `true` if the Cpu is executing the `HALT` instruction.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Returns `true` if the last executed instruction was `EI`.
    #[inline]
    pub fn is_after_ei(&self) -> bool {
        self.last_ei
    }

    /// Returns the `0xDD` or `0xFD` prefix waiting for the next op-code.
    #[inline]
    pub fn prefix(&self) -> Option<Prefix> {
        self.prefix
    }

    #[inline]
    pub fn is_after_prefix(&self) -> bool {
        self.prefix.is_some()
    }

    /// Executes a single instruction or a single `0xDD`/`0xFD` prefix.
    ///
    /// While the Cpu is halted each step is a 4 T-states M1 cycle at the address of the
    /// `HALT` op-code which increments the memory refresh counter.
    pub fn step(&mut self, hal: &mut dyn Hal) {
        self.q.begin_instruction();
        self.last_ei = false;
        let pc = self.regs.pc();
        if self.regs.halted {
            hal.fetch_m1(pc);
            self.regs.inc_r();
            return
        }
        let code = hal.fetch_m1(pc);
        self.regs.inc_r();
        self.regs.set_pc(pc.wrapping_add(1));
        if Prefix::from_code(code).is_some() {
            self.execute(hal, &table::BASE[code as usize], code);
            return
        }
        self.trace(hal, if self.prefix.is_some() { pc.wrapping_sub(1) } else { pc });
        self.execute(hal, &table::BASE[code as usize], code);
        self.prefix = None;
    }

    /// Requests a maskable interrupt with `data` present on the data bus.
    ///
    /// Returns `false` if the interrupt was not accepted: interrupts are disabled, or
    /// the last instruction was `EI` or a prefix.
    ///
    /// * In the mode 0 the `data` is executed as an instruction, typically `RST`.
    /// * In the mode 1 the `RST 38H` is executed.
    /// * In the mode 2 the routine address is read from `I << 8 | data`.
    pub fn irq(&mut self, hal: &mut dyn Hal, data: u8) -> bool {
        if !self.regs.iff1 || !self.is_int_allowed() {
            return false
        }
        self.q.begin_instruction();
        self.regs.set_iffs(false, false);
        self.regs.inc_r();
        let pc = self.leave_halt();
        hal.contend_memory(pc);
        hal.add_t_states(crate::host::cycles::IRQ_CYCLE);
        trace!(target: TRACE_TARGET, "IRQ IM{} data: {:02X}", self.regs.im as u8, data);
        match self.regs.im {
            InterruptMode::Mode0 => {
                self.execute(hal, &table::BASE[data as usize], data);
            }
            InterruptMode::Mode1 => {
                let code = crate::opconsts::RST_38H_OPCODE;
                self.execute(hal, &table::BASE[code as usize], code);
            }
            InterruptMode::Mode2 => {
                self.ir_cycles(hal, 1);
                self.push16(hal, pc);
                self.regs.set_pc(self.regs.ir() & 0xFF00 | data as u16);
                let code = crate::opconsts::JP_OPCODE;
                self.execute(hal, &table::BASE[code as usize], code);
            }
        }
        true
    }

    /// Triggers a non-maskable interrupt.
    ///
    /// Returns `false` if the interrupt was not accepted because the last instruction was
    /// `EI` or a prefix.
    pub fn nmi(&mut self, hal: &mut dyn Hal) -> bool {
        if !self.is_int_allowed() {
            return false
        }
        self.q.begin_instruction();
        self.regs.iff1 = false;
        self.regs.inc_r();
        let pc = self.leave_halt();
        hal.fetch_m1(pc);
        self.ir_cycles(hal, 1);
        self.push16(hal, pc);
        self.regs.set_pc(crate::NMI_RESTART);
        trace!(target: TRACE_TARGET, "NMI");
        true
    }

    #[inline]
    fn is_int_allowed(&self) -> bool {
        !self.last_ei && self.prefix.is_none()
    }

    /// Leaves the `HALT` state moving PC past the `HALT` op-code, returns the current PC.
    fn leave_halt(&mut self) -> u16 {
        let mut pc = self.regs.pc();
        if self.regs.halted {
            self.regs.halted = false;
            pc = pc.wrapping_add(1);
            self.regs.set_pc(pc);
        }
        pc
    }

    #[inline]
    fn execute(&mut self, hal: &mut dyn Hal, instr: &table::Instruction, code: u8) {
        (instr.exec)(self, hal, code)
    }

    fn trace(&self, hal: &dyn Hal, pc: u16) {
        if log_enabled!(target: TRACE_TARGET, Level::Trace) {
            let mut code = [0u8; MAX_INSTRUCTION_LEN];
            for (i, byte) in code.iter_mut().enumerate() {
                *byte = hal.read_debug(pc.wrapping_add(i as u16));
            }
            let dis = disasm::disassemble(pc, &code);
            trace!(target: TRACE_TARGET, "{}", dis);
        }
    }
}
