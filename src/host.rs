/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module defines the interfaces between a host and the [Z80](crate::Z80).
//!
//! The Cpu never owns memory or peripherals. Everything it touches is reached through
//! the [Hal] umbrella trait, which is implemented automatically for any type implementing
//! [Clock], [Memory] and [Io].
pub mod cycles {
    /// An op-code fetch, NMI and HALT cycle T-states.
    pub const M1_CYCLE: u32 = 4;
    /// A memory read/write cycle T-states.
    pub const MEMRW_CYCLE: u32 = 3;
    /// A minimum number of T-states in the I/O cycle before the value is being provided on the bus.
    pub const IO_PRE_OP_CYCLE: u32 = 1;
    /// A minimum number of T-states in the I/O cycle after the value is being available on the bus.
    pub const IO_POST_OP_CYCLE: u32 = 3;
    /// A total number of T-states for I/O cycle.
    pub const IO_CYCLE: u32 = IO_PRE_OP_CYCLE + IO_POST_OP_CYCLE;
    /// A maskable interrupt request cycle T-states.
    pub const IRQ_CYCLE: u32 = 6;
}
use cycles::*;

/// A T-states counter.
///
/// The Cpu advances it at the exact moments of each bus cycle.
pub trait Clock {
    /// Returns the current number of T-states.
    fn t_states(&self) -> u64;
    /// Advances the counter.
    fn add_t_states(&mut self, ts: u32);
}

/// An interface to the memory.
pub trait Memory {
    /// Used by the Cpu to read from the memory, including op-code fetches.
    fn read_memory(&mut self, addr: u16) -> u8;
    /// Used by the Cpu for writing to the memory.
    fn write_memory(&mut self, addr: u16, value: u8);
    /// Called before each memory cycle and for each internal (no `MREQ`) cycle with the
    /// address present on the bus.
    ///
    /// An implementation may advance the [Clock] to emulate wait states.
    fn contend_memory(&mut self, _addr: u16) {}
    /// Used by the instruction trace and by the debuggers. Must not have any side effects.
    ///
    /// The default implementation returns `0xFF`.
    fn read_debug(&self, _addr: u16) -> u8 {
        u8::MAX
    }
}

/// I/O operations.
pub trait Io {
    /// Used by the Cpu to read data from the I/O port.
    fn read_port(&mut self, port: u16) -> u8;
    /// Used by the Cpu to write data to the I/O port.
    fn write_port(&mut self, port: u16, value: u8);
    /// Called before each I/O cycle with the full 16-bit port address.
    ///
    /// An implementation may advance the [Clock] to emulate wait states.
    fn contend_port(&mut self, _port: u16) {}
}

/// The Hardware Abstraction Layer required by [Z80::step](crate::Z80::step).
pub trait Hal: Clock + Memory + Io {}

impl<T: Clock + Memory + Io + ?Sized> Hal for T {}

/// A simple T-states counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TsCounter(pub u64);

impl Clock for TsCounter {
    #[inline]
    fn t_states(&self) -> u64 {
        self.0
    }

    #[inline]
    fn add_t_states(&mut self, ts: u32) {
        self.0 = self.0.wrapping_add(ts.into());
    }
}

impl From<u64> for TsCounter {
    fn from(ts: u64) -> Self {
        TsCounter(ts)
    }
}

/// A flat 64kb memory without any contention and with an open I/O bus, good for testing.
///
/// Reading a port returns `0xFF`. The last value written to a port is remembered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleHost {
    pub memory: Box<[u8; 0x10000]>,
    pub clock: TsCounter,
    pub last_port_write: Option<(u16, u8)>,
}

impl Default for SimpleHost {
    fn default() -> Self {
        SimpleHost {
            memory: Box::new([0; 0x10000]),
            clock: TsCounter::default(),
            last_port_write: None,
        }
    }
}

impl SimpleHost {
    /// Creates a new host with `code` copied at the beginning of the memory.
    ///
    /// Anything beyond 64kb is ignored.
    pub fn with_memory(code: &[u8]) -> Self {
        let mut host = SimpleHost::default();
        let len = code.len().min(host.memory.len());
        host.memory[..len].copy_from_slice(&code[..len]);
        host
    }
}

impl Clock for SimpleHost {
    fn t_states(&self) -> u64 {
        self.clock.t_states()
    }

    fn add_t_states(&mut self, ts: u32) {
        self.clock.add_t_states(ts)
    }
}

impl Memory for SimpleHost {
    fn read_memory(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    fn read_debug(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }
}

impl Io for SimpleHost {
    fn read_port(&mut self, _port: u16) -> u8 {
        0xFF
    }

    fn write_port(&mut self, port: u16, value: u8) {
        self.last_port_write = Some((port, value));
    }
}

/// Bus cycles as seen by the Cpu.
///
/// Each method calls the proper contention hook first, then advances the [Clock]
/// and finally performs the access.
pub(crate) trait BusCycles {
    /// An op-code fetch cycle.
    fn fetch_m1(&mut self, pc: u16) -> u8;
    /// A memory read cycle.
    fn read_mreq(&mut self, addr: u16) -> u8;
    /// A memory write cycle.
    fn write_mreq(&mut self, addr: u16, value: u8);
    /// Internal cycles with `addr` present on the address bus.
    fn add_no_mreq(&mut self, addr: u16, count: u32);
    /// An I/O read cycle.
    fn read_io(&mut self, port: u16) -> u8;
    /// An I/O write cycle.
    fn write_io(&mut self, port: u16, value: u8);
}

impl<H: Hal + ?Sized> BusCycles for H {
    #[inline]
    fn fetch_m1(&mut self, pc: u16) -> u8 {
        self.contend_memory(pc);
        self.add_t_states(M1_CYCLE);
        self.read_memory(pc)
    }

    #[inline]
    fn read_mreq(&mut self, addr: u16) -> u8 {
        self.contend_memory(addr);
        self.add_t_states(MEMRW_CYCLE);
        self.read_memory(addr)
    }

    #[inline]
    fn write_mreq(&mut self, addr: u16, value: u8) {
        self.contend_memory(addr);
        self.add_t_states(MEMRW_CYCLE);
        self.write_memory(addr, value)
    }

    #[inline]
    fn add_no_mreq(&mut self, addr: u16, count: u32) {
        for _ in 0..count {
            self.contend_memory(addr);
            self.add_t_states(1);
        }
    }

    #[inline]
    fn read_io(&mut self, port: u16) -> u8 {
        self.contend_port(port);
        self.add_t_states(IO_PRE_OP_CYCLE);
        let data = self.read_port(port);
        self.add_t_states(IO_POST_OP_CYCLE);
        data
    }

    #[inline]
    fn write_io(&mut self, port: u16, value: u8) {
        self.contend_port(port);
        self.add_t_states(IO_PRE_OP_CYCLE);
        self.write_port(port, value);
        self.add_t_states(IO_POST_OP_CYCLE);
    }
}
