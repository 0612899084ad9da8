// To see the estimated CPU MHz and the decoding speed run with:
//
// cargo +nightly bench --bench emulation -- --nocapture
#![feature(test)]
extern crate test;
use test::{black_box, Bencher};

use trs80emu::{host::SimpleHost, opconsts::HALT_OPCODE, tape::{*, encoder::*}, *};

const RATE: u32 = 44100;

/// Sums 16-bit numbers in a tight loop, 65535 iterations.
const KERNEL: &[u8] = &[
    0x21, 0x00, 0x00, // 0x0000 LD   HL, 0x0000
    0x01, 0xFF, 0xFF, // 0x0003 LD   BC, 0xFFFF
    0x09,             // 0x0006 ADD  HL, BC
    0x0B,             // 0x0007 DEC  BC
    0x78,             // 0x0008 LD   A, B
    0xB1,             // 0x0009 OR   C
    0x20, 0xFA,       // 0x000A JR   NZ, 0x0006
    HALT_OPCODE       // 0x000C HALT
];

#[bench]
fn bench_z80_steps(ben: &mut Bencher) {
    let mut total = 0;
    let mut elapsed = std::time::Duration::ZERO;
    ben.iter(|| {
        let mut host = SimpleHost::with_memory(KERNEL);
        let mut cpu = Z80::new();
        let start = std::time::Instant::now();
        while !cpu.is_halted() {
            cpu.step(&mut host);
        }
        elapsed += start.elapsed();
        total += host.t_states();
        black_box(cpu.regs().hl())
    });
    if !elapsed.is_zero() {
        println!("\nCPU MHz: {:.0}", total as f64 / elapsed.as_secs_f64() / 1e6);
    }
}

fn bench_decode(ben: &mut Bencher, samples: Vec<i16>) {
    let tape = Tape::new("bench", samples, RATE).unwrap();
    let seconds = tape.len() as f64 / RATE as f64;
    let decoder = Decoder::default();
    let mut elapsed = std::time::Duration::ZERO;
    let mut runs = 0u32;
    ben.iter(|| {
        let start = std::time::Instant::now();
        let programs = decoder.decode(&tape);
        elapsed += start.elapsed();
        runs += 1;
        assert_eq!(programs.len(), 1);
        black_box(programs)
    });
    if !elapsed.is_zero() {
        println!("\ntape seconds per second: {:.0}", seconds * runs as f64 / elapsed.as_secs_f64());
    }
}

#[bench]
fn bench_decode_low_speed(ben: &mut Bencher) {
    let data: Vec<u8> = (0..=255).collect();
    bench_decode(ben, encode_low_speed(&wrap_low_speed(&data), RATE));
}

#[bench]
fn bench_decode_high_speed(ben: &mut Bencher) {
    let data: Vec<u8> = (0..=255).cycle().take(1024).collect();
    bench_decode(ben, encode_high_speed(&data, RATE));
}
