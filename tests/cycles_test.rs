//! Tests bus cycles and T-states of Cpu instructions.
use core::ops::RangeInclusive;

use trs80emu::{host::{SimpleHost, cycles::*}, opconsts::*, *};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bus {
    Mem(u16),
    Port(u16)
}

use Bus::*;

/// Records each contention call with the T-states counter at the moment of the call.
struct TestHost {
    inner: SimpleHost,
    events: Vec<(u64, Bus)>,
    contended: Option<RangeInclusive<u16>>,
    wait_states: u32
}

impl TestHost {
    fn new(code: &[u8]) -> Self {
        TestHost {
            inner: SimpleHost::with_memory(code),
            events: Vec::new(),
            contended: None,
            wait_states: 0
        }
    }

    fn with_contention(code: &[u8], range: RangeInclusive<u16>, wait_states: u32) -> Self {
        TestHost { contended: Some(range), wait_states, ..TestHost::new(code) }
    }

    fn poke(&mut self, addr: u16, data: &[u8]) {
        let addr = addr as usize;
        self.inner.memory[addr..addr + data.len()].copy_from_slice(data);
    }

    fn peek(&self, addr: u16) -> u8 {
        self.inner.memory[addr as usize]
    }
}

impl Clock for TestHost {
    fn t_states(&self) -> u64 {
        self.inner.t_states()
    }

    fn add_t_states(&mut self, ts: u32) {
        self.inner.add_t_states(ts)
    }
}

impl Memory for TestHost {
    fn read_memory(&mut self, addr: u16) -> u8 {
        self.inner.read_memory(addr)
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.inner.write_memory(addr, value)
    }

    fn contend_memory(&mut self, addr: u16) {
        self.events.push((self.t_states(), Mem(addr)));
        if matches!(&self.contended, Some(range) if range.contains(&addr)) {
            self.add_t_states(self.wait_states);
        }
    }

    fn read_debug(&self, addr: u16) -> u8 {
        self.inner.read_debug(addr)
    }
}

impl Io for TestHost {
    fn read_port(&mut self, port: u16) -> u8 {
        self.inner.read_port(port)
    }

    fn write_port(&mut self, port: u16, value: u8) {
        self.inner.write_port(port, value)
    }

    fn contend_port(&mut self, port: u16) {
        self.events.push((self.t_states(), Port(port)));
    }
}

/// Executes a single instruction including its prefixes.
fn exec(cpu: &mut Z80, host: &mut TestHost) {
    loop {
        cpu.step(host);
        if !cpu.is_after_prefix() {
            break
        }
    }
}

fn repeated(ts: u64, bus: Bus, count: u64) -> impl Iterator<Item=(u64, Bus)> {
    (ts..ts + count).map(move |ts| (ts, bus))
}

#[test]
fn cycles_ld_mem_n() {
    let mut host = TestHost::new(&[0x36, 0xAA]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_hl(0x8000);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(1)), (7, Mem(0x8000))]);
    assert_eq!(host.t_states(), 10);
    assert_eq!(host.peek(0x8000), 0xAA);
}

#[test]
fn cycles_inc_mem() {
    let mut host = TestHost::new(&[0x34]);
    host.poke(0x8000, &[0x7F]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_hl(0x8000);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(0x8000)), (7, Mem(0x8000)), (8, Mem(0x8000))]);
    assert_eq!(host.t_states(), 11);
    assert_eq!(host.peek(0x8000), 0x80);
    let flags = cpu.regs().flags();
    assert!(flags.sf() && flags.pvf() && flags.hf() && !flags.nf());
}

#[test]
fn cycles_add_hl_rp() {
    let mut host = TestHost::new(&[0x19]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_i(0x3F);
    cpu.regs_mut().set_hl(0x1000);
    cpu.regs_mut().set_de(0x0234);
    exec(&mut cpu, &mut host);
    let mut expected = vec![(0, Mem(0))];
    expected.extend(repeated(4, Mem(0x3F01), 7));
    assert_eq!(host.events, expected);
    assert_eq!(host.t_states(), 11);
    assert_eq!(cpu.regs().hl(), 0x1234);
    assert_eq!(cpu.regs().memptr(), 0x1001);
}

#[test]
fn cycles_jr() {
    let mut host = TestHost::new(&[0x18, 0x02]);
    let mut cpu = Z80::new();
    exec(&mut cpu, &mut host);
    let mut expected = vec![(0, Mem(0)), (4, Mem(1))];
    expected.extend(repeated(7, Mem(1), 5));
    assert_eq!(host.events, expected);
    assert_eq!(host.t_states(), 12);
    assert_eq!(cpu.regs().pc(), 4);
}

#[test]
fn cycles_jr_cc_not_taken() {
    let mut host = TestHost::new(&[0x20, 0x02]); // JR NZ
    let mut cpu = Z80::new();
    cpu.regs_mut().set_f(0xFF);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(1))]);
    assert_eq!(host.t_states(), 7);
    assert_eq!(cpu.regs().pc(), 2);
}

#[test]
fn cycles_push() {
    let mut host = TestHost::new(&[0xC5]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_sp(0x8000);
    cpu.regs_mut().set_bc(0x1234);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(0x0001)), (5, Mem(0x7FFF)), (8, Mem(0x7FFE))]);
    assert_eq!(host.t_states(), 11);
    assert_eq!((host.peek(0x7FFE), host.peek(0x7FFF)), (0x34, 0x12));
    assert_eq!(cpu.regs().sp(), 0x7FFE);
}

#[test]
fn cycles_ex_sp_hl() {
    let mut host = TestHost::new(&[0xE3]);
    host.poke(0x8000, &[0x34, 0x12]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_sp(0x8000);
    cpu.regs_mut().set_hl(0xABCD);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [
        (0, Mem(0)),
        (4, Mem(0x8000)), (7, Mem(0x8001)), (10, Mem(0x8001)),
        (11, Mem(0x8001)), (14, Mem(0x8000)), (17, Mem(0x8000)), (18, Mem(0x8000))]);
    assert_eq!(host.t_states(), 19);
    assert_eq!(cpu.regs().hl(), 0x1234);
    assert_eq!(cpu.regs().memptr(), 0x1234);
    assert_eq!((host.peek(0x8000), host.peek(0x8001)), (0xCD, 0xAB));
}

#[test]
fn cycles_call_ret() {
    let mut host = TestHost::new(&[0xCD, 0x00, 0x10]);
    host.poke(0x1000, &[0xC9]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_sp(0);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [
        (0, Mem(0)), (4, Mem(1)), (7, Mem(2)), (10, Mem(2)), (11, Mem(0xFFFF)), (14, Mem(0xFFFE))]);
    assert_eq!(host.t_states(), 17);
    assert_eq!(cpu.regs().pc(), 0x1000);
    assert_eq!((host.peek(0xFFFE), host.peek(0xFFFF)), (3, 0));
    host.events.clear();
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(17, Mem(0x1000)), (21, Mem(0xFFFE)), (24, Mem(0xFFFF))]);
    assert_eq!(host.t_states(), 27);
    assert_eq!(cpu.regs().pc(), 3);
    assert_eq!(cpu.regs().sp(), 0);
}

#[test]
fn cycles_ldir() {
    let mut host = TestHost::new(&[0xED, 0xB0]);
    host.poke(0x4000, &[1, 2]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_bc(2);
    cpu.regs_mut().set_hl(0x4000);
    cpu.regs_mut().set_de(0x5000);
    exec(&mut cpu, &mut host);
    let mut expected = vec![(0, Mem(0)), (4, Mem(1)), (8, Mem(0x4000)), (11, Mem(0x5000))];
    expected.extend(repeated(14, Mem(0x5000), 2 + 5));
    assert_eq!(host.events, expected);
    assert_eq!(host.t_states(), 21);
    assert_eq!(cpu.regs().pc(), 0);
    assert_eq!(cpu.regs().bc(), 1);
    assert_eq!(cpu.regs().memptr(), 1);
    assert!(cpu.regs().flags().pvf());
    host.events.clear();
    exec(&mut cpu, &mut host);
    let mut expected = vec![(21, Mem(0)), (25, Mem(1)), (29, Mem(0x4001)), (32, Mem(0x5001))];
    expected.extend(repeated(35, Mem(0x5001), 2));
    assert_eq!(host.events, expected);
    assert_eq!(host.t_states(), 37);
    assert_eq!(cpu.regs().pc(), 2);
    assert_eq!(cpu.regs().bc(), 0);
    assert!(!cpu.regs().flags().pvf());
    assert_eq!((host.peek(0x5000), host.peek(0x5001)), (1, 2));
    assert_eq!(cpu.regs().hl(), 0x4002);
    assert_eq!(cpu.regs().de(), 0x5002);
}

#[test]
fn cycles_io() {
    let mut host = TestHost::new(&[0xDB, 0xFE, 0xED, 0x79]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_a(0x12);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(1)), (7, Port(0x12FE))]);
    assert_eq!(host.t_states(), 7 + IO_CYCLE as u64);
    assert_eq!(cpu.regs().a(), 0xFF);
    assert_eq!(cpu.regs().memptr(), 0x12FF);
    host.events.clear();
    cpu.regs_mut().set_bc(0x34FE);
    cpu.regs_mut().set_a(0x56);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(11, Mem(2)), (15, Mem(3)), (19, Port(0x34FE))]);
    assert_eq!(host.t_states(), 23);
    assert_eq!(host.inner.last_port_write, Some((0x34FE, 0x56)));
    assert_eq!(cpu.regs().memptr(), 0x34FF);
}

#[test]
fn cycles_index_ld_mem_n() {
    let mut host = TestHost::new(&[0xDD, 0x36, 0x05, 0xAA]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_ix(0x8000);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [
        (0, Mem(0)), (4, Mem(1)), (8, Mem(2)), (11, Mem(3)), (14, Mem(3)), (15, Mem(3)), (16, Mem(0x8005))]);
    assert_eq!(host.t_states(), 19);
    assert_eq!(host.peek(0x8005), 0xAA);
    assert_eq!(cpu.regs().pc(), 4);
}

#[test]
fn cycles_index_bit() {
    let mut host = TestHost::new(&[0xFD, 0xCB, 0xFE, 0x46]); // BIT 0,(IY-02H)
    let mut cpu = Z80::new();
    cpu.regs_mut().set_iy(0x8001);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [
        (0, Mem(0)), (4, Mem(1)), (8, Mem(2)), (11, Mem(3)), (14, Mem(3)), (15, Mem(3)),
        (16, Mem(0x7FFF)), (19, Mem(0x7FFF))]);
    assert_eq!(host.t_states(), 20);
    let flags = cpu.regs().flags();
    assert!(flags.zf());
    assert!(flags.hf());
    assert_eq!(flags & CpuFlags::XY, CpuFlags::XY);
    assert_eq!(cpu.regs().memptr(), 0x7FFF);
}

#[test]
fn cycles_contention() {
    let mut host = TestHost::with_contention(&[0x36, 0xAA, 0x36, 0x55], 0x4000..=0x7FFF, 2);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_hl(0x4000);
    exec(&mut cpu, &mut host);
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(1)), (7, Mem(0x4000))]);
    assert_eq!(host.t_states(), 12);
    cpu.regs_mut().set_hl(0x8000);
    exec(&mut cpu, &mut host);
    assert_eq!(host.t_states(), 22);
    assert_eq!((host.peek(0x4000), host.peek(0x8000)), (0xAA, 0x55));
}

#[test]
fn cycles_irq_mode2_from_halt() {
    let mut host = TestHost::new(&[HALT_OPCODE]);
    host.poke(0x8010, &[0x34, 0x12]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_sp(0);
    cpu.regs_mut().set_i(0x80);
    cpu.regs_mut().set_iffs(true, true);
    cpu.regs_mut().set_im(InterruptMode::Mode2);
    exec(&mut cpu, &mut host);
    assert!(cpu.is_halted());
    assert_eq!(host.t_states(), M1_CYCLE as u64);
    host.events.clear();
    assert!(cpu.irq(&mut host, 0x10));
    assert_eq!(host.events, [
        (4, Mem(1)), (10, Mem(0x8002)), (11, Mem(0xFFFF)), (14, Mem(0xFFFE)), (17, Mem(0x8010)), (20, Mem(0x8011))]);
    assert_eq!(host.t_states(), 23);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs().pc(), 0x1234);
    assert_eq!(cpu.regs().iffs(), (false, false));
    assert_eq!((host.peek(0xFFFE), host.peek(0xFFFF)), (1, 0));
}

#[test]
fn cycles_nmi() {
    let mut host = TestHost::new(&[NOP_OPCODE]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_sp(0);
    cpu.regs_mut().set_iffs(true, true);
    assert!(cpu.nmi(&mut host));
    assert_eq!(host.events, [(0, Mem(0)), (4, Mem(0x0001)), (5, Mem(0xFFFF)), (8, Mem(0xFFFE))]);
    assert_eq!(host.t_states(), 11);
    assert_eq!(cpu.regs().pc(), NMI_RESTART);
    assert_eq!(cpu.regs().iffs(), (false, true));
}
