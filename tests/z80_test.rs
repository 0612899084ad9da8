//! Tests Cpu arithmetic against the reference formulas, and the instruction tables as a whole.
use rand::prelude::*;
use simplelog::{Config, LevelFilter, TestLogger};

use trs80emu::{disasm::{disassemble, disassemble_memory}, host::SimpleHost, opconsts::*, z80::table::decode, *};

/// Runs the `code` until PC leaves it.
fn exec_code<F: FnOnce(&mut RegisterSet)>(code: &[u8], setup: F) -> (Z80, SimpleHost) {
    let mut host = SimpleHost::with_memory(code);
    let mut cpu = Z80::new();
    setup(cpu.regs_mut());
    while (cpu.regs().pc() as usize) < code.len() {
        cpu.step(&mut host);
    }
    (cpu, host)
}

fn sz_xy(res: u8) -> u8 {
    res & (CpuFlags::S|CpuFlags::XY).bits() | if res == 0 { CpuFlags::Z.bits() } else { 0 }
}

#[test]
fn z80_add_sub_flags() {
    // ADD A,B; SUB B; CP B
    let mut host = SimpleHost::with_memory(&[0x80, 0x90, 0xB8]);
    let mut cpu = Z80::new();
    let mut exec = |pc: u16, a: u8, b: u8| {
        let regs = cpu.regs_mut();
        regs.set_pc(pc);
        regs.set_a(a);
        regs.set_b(b);
        cpu.step(&mut host);
        assert_eq!(cpu.regs().pc(), pc + 1);
        (cpu.regs().a(), cpu.regs().f())
    };
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            let res = a.wrapping_add(b);
            let mut flags = sz_xy(res);
            if (a & 0x0F) + (b & 0x0F) > 0x0F { flags |= CpuFlags::H.bits() }
            if (a ^ !b) & (a ^ res) & 0x80 != 0 { flags |= CpuFlags::V.bits() }
            if (a as u16 + b as u16) > 0xFF { flags |= CpuFlags::C.bits() }
            assert_eq!(exec(0, a, b), (res, flags), "ADD {:02X},{:02X}", a, b);

            let res = a.wrapping_sub(b);
            let mut flags = sz_xy(res) | CpuFlags::N.bits();
            if a & 0x0F < b & 0x0F { flags |= CpuFlags::H.bits() }
            if (a ^ b) & (a ^ res) & 0x80 != 0 { flags |= CpuFlags::V.bits() }
            if a < b { flags |= CpuFlags::C.bits() }
            assert_eq!(exec(1, a, b), (res, flags), "SUB {:02X},{:02X}", a, b);
            // CP leaves A intact and takes bits 3 and 5 from the operand
            let flags = flags & !CpuFlags::XY.bits() | b & CpuFlags::XY.bits();
            assert_eq!(exec(2, a, b), (a, flags), "CP {:02X},{:02X}", a, b);
        }
    }
}

#[test]
fn z80_daa_adds_bcd() {
    let mut rng = StdRng::seed_from_u64(99);
    let bcd = |n: u8| (n / 10) << 4 | n % 10;
    for _ in 0..1000 {
        let (x, y) = (rng.gen_range(0..100u8), rng.gen_range(0..100u8));
        // ADD A,B; DAA
        let (cpu, _) = exec_code(&[0x80, 0x27], |regs| {
            regs.set_a(bcd(x));
            regs.set_b(bcd(y));
        });
        assert_eq!(cpu.regs().a(), bcd((x + y) % 100), "{} + {}", x, y);
        assert_eq!(cpu.regs().flags().cf(), x + y >= 100);
        // SUB B; DAA
        let (cpu, _) = exec_code(&[0x90, 0x27], |regs| {
            regs.set_a(bcd(x));
            regs.set_b(bcd(y));
        });
        assert_eq!(cpu.regs().a(), bcd((100 + x - y) % 100), "{} - {}", x, y);
        assert_eq!(cpu.regs().flags().cf(), x < y);
        assert!(cpu.regs().flags().nf());
    }
}

#[test]
fn z80_16bit_arithmetic() {
    let mut rng = StdRng::seed_from_u64(16);
    for _ in 0..1000 {
        let (hl, de, carry): (u16, u16, bool) = rng.gen();
        // SBC HL,DE
        let (cpu, _) = exec_code(&[0xED, 0x52], |regs| {
            regs.set_hl(hl);
            regs.set_de(de);
            regs.set_f(carry as u8);
        });
        let res = hl.wrapping_sub(de).wrapping_sub(carry as u16);
        let flags = cpu.regs().flags();
        assert_eq!(cpu.regs().hl(), res);
        assert_eq!(flags.cf(), (hl as u32) < de as u32 + carry as u32);
        assert_eq!(flags.zf(), res == 0);
        assert_eq!(flags.sf(), res & 0x8000 != 0);
        assert!(flags.nf());
        assert_eq!(cpu.regs().f() & CpuFlags::XY.bits(), (res >> 8) as u8 & CpuFlags::XY.bits());
        assert_eq!(cpu.regs().memptr(), hl.wrapping_add(1));
        // ADD IX,DE keeps S, Z and P/V
        let (cpu, _) = exec_code(&[0xDD, 0x19], |regs| {
            regs.set_ix(hl);
            regs.set_de(de);
            regs.set_f(0xFF);
        });
        let flags = cpu.regs().flags();
        assert_eq!(cpu.regs().ix(), hl.wrapping_add(de));
        assert_eq!(flags.cf(), (hl as u32 + de as u32) > 0xFFFF);
        assert!(flags.sf() && flags.zf() && flags.pvf() && !flags.nf());
    }
}

#[test]
fn z80_rotations_and_exchanges() {
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..500 {
        let a: u8 = rng.gen();
        // RLCA x 8
        let (cpu, _) = exec_code(&[0x07; 8], |regs| regs.set_a(a));
        assert_eq!(cpu.regs().a(), a);
        // RLC B; RRC B
        let (cpu, _) = exec_code(&[0xCB, 0x00, 0xCB, 0x08], |regs| regs.set_b(a));
        assert_eq!(cpu.regs().b(), a);
        assert_eq!(cpu.regs().flags().cf(), a & 0x80 != 0);
        assert_eq!(cpu.regs().flags().pvf(), a.count_ones() & 1 == 0);
        // SLA A then SRL A clears bit 7
        let (cpu, _) = exec_code(&[0xCB, 0x27, 0xCB, 0x3F], |regs| regs.set_a(a));
        assert_eq!(cpu.regs().a(), a & 0x7F);
        let (bc, de, hl, af): (u16, u16, u16, u16) = rng.gen();
        // EXX; EX AF,AF'; LD B,77H; EXX; EX AF,AF'
        let (cpu, _) = exec_code(&[0xD9, 0x08, 0x06, 0x77, 0xD9, 0x08], |regs| {
            regs.set_bc(bc);
            regs.set_de(de);
            regs.set_hl(hl);
            regs.set_af(af);
        });
        assert_eq!((cpu.regs().bc(), cpu.regs().de(), cpu.regs().hl(), cpu.regs().af()), (bc, de, hl, af));
        assert_eq!(cpu.regs().bc_alt() >> 8, 0x77);
    }
}

#[test]
fn z80_cpir_finds_byte() {
    let mut code = vec![0xED, 0xB1, HALT_OPCODE]; // CPIR
    let mut rng = StdRng::seed_from_u64(1);
    let data: Vec<u8> = (0..200).map(|_| rng.gen_range(1..=255)).collect();
    code.extend(&data);
    code.push(0);
    let mut host = SimpleHost::with_memory(&code);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_a(0);
    cpu.regs_mut().set_hl(3);
    cpu.regs_mut().set_bc(1000);
    while !cpu.is_halted() {
        cpu.step(&mut host);
    }
    assert_eq!(cpu.regs().hl(), 3 + 201);
    assert_eq!(cpu.regs().bc(), 1000 - 201);
    assert!(cpu.regs().flags().zf());
    assert!(cpu.regs().flags().pvf());
    // 200 repeated and 1 final comparison, HALT
    assert_eq!(host.t_states(), 200 * 21 + 16 + 4);
}

#[test]
fn z80_survives_random_code() {
    let mut rng = StdRng::seed_from_u64(0xDEAD);
    let mut host = SimpleHost::default();
    rng.fill(&mut host.memory[..]);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_iffs(true, true);
    for n in 0..100_000 {
        let ts = host.t_states();
        if cpu.is_halted() || n % 1000 == 0 {
            cpu.irq(&mut host, rng.gen());
        }
        cpu.step(&mut host);
        assert!(host.t_states() >= ts + 4);
    }
}

/// Instructions which may leave PC anywhere else than after themselves.
const FLOW_CONTROL: &[&str] = &[
    "JP", "JR", "DJNZ", "CALL", "RET", "RETI", "RETN", "RST", "HALT",
    "LDIR", "CPIR", "INIR", "OTIR", "LDDR", "CPDR", "INDR", "OTDR"
];

#[test]
fn z80_executes_every_opcode() {
    let mut sequences: Vec<Vec<u8>> = Vec::new();
    for op in 0..=255u8 {
        sequences.push(vec![op]);
        sequences.push(vec![0xCB, op]);
        sequences.push(vec![0xED, op]);
        for prefix in [0xDD, 0xFD] {
            sequences.push(vec![prefix, op]);
            sequences.push(vec![prefix, 0xCB, 0x05, op]);
        }
    }
    for mut code in sequences {
        code.extend_from_slice(&[0x05, 0x42, 0x24]);
        let decoded = decode(&code).unwrap_or_else(|| panic!("{:02X?}", code));
        let dis = disassemble(0, &code);
        assert_eq!(dis.len(), decoded.len, "{:02X?}", code);
        assert_ne!(dis.mnemonic, "DEFB", "{:02X?}", code);

        let mut host = SimpleHost::with_memory(&code);
        let mut cpu = Z80::new();
        let regs = cpu.regs_mut();
        regs.set_sp(0xC000);
        regs.set_bc(0x8000);
        regs.set_de(0x8100);
        regs.set_hl(0x8200);
        regs.set_ix(0x8300);
        regs.set_iy(0x8400);
        cpu.step(&mut host);
        while cpu.is_after_prefix() && (cpu.regs().pc() as usize) < decoded.len {
            cpu.step(&mut host);
        }
        if !FLOW_CONTROL.contains(&decoded.instruction.mnemonic) {
            assert_eq!(cpu.regs().pc() as usize, decoded.len, "{} {:02X?}", dis, code);
        }
    }
}

#[test]
fn z80_traces_instructions() {
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
    let code = [
        0x3E, 0x05,       // LD   A,05H
        0x3D,             // DEC  A
        0x20, 0xFD,       // JR   NZ,0002H
        0xDD, 0xCB, 0x01, 0xC6, // SET 0,(IX+01H)
        0xFD, 0xED, 0x43, 0x00, 0x90, // LD (9000H),BC
        HALT_OPCODE
    ];
    let dis: Vec<_> = disassemble_memory(&code, 0, 6).iter().map(|d| d.to_string_brief()).collect();
    assert_eq!(dis, ["LD A,05H", "DEC A", "JR NZ,0002H", "SET 0,(IX+01H)", "LD (9000H),BC", "HALT"]);
    let mut host = SimpleHost::with_memory(&code);
    let mut cpu = Z80::new();
    cpu.regs_mut().set_ix(0x8000);
    while !cpu.is_halted() {
        cpu.step(&mut host);
    }
    assert_eq!(cpu.regs().a(), 0);
    assert_eq!(host.memory[0x8001], 1);
    assert_eq!(host.t_states(), 7 + 5 * 4 + 4 * 12 + 7 + 23 + 4 + 20 + 4);
}

#[cfg(feature = "serde")]
#[test]
fn z80_state_bincode() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut cpu = Z80::with_flavour(Flavour::Bm1);
    let regs = cpu.regs_mut();
    regs.set_bc(rng.gen());
    regs.set_hl_alt(rng.gen());
    regs.set_iy(rng.gen());
    regs.set_memptr(rng.gen());
    regs.set_im(InterruptMode::Mode1);
    regs.set_iffs(true, false);
    let bytes = bincode::serialize(&cpu).unwrap();
    let cpu2: Z80 = bincode::deserialize(&bytes).unwrap();
    assert_eq!(cpu, cpu2);
}
