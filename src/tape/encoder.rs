/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Renders bytes as clean cassette audio.
//!
//! The encoders are the inverse of the decoders and mostly serve to produce test material
//! or to re-master a damaged program found on a tape.
use core::f64::consts::PI;
use super::audio::{concat_audio, low_speed_pulse_rate, make_silence, LOW_SPEED_BAUD};
use super::high_speed::{HIGH_SPEED_HEADER, HIGH_SPEED_HEADER_LEN, HIGH_SPEED_SYNC};
use super::low_speed::{LOW_SPEED_LEADER_LEN, LOW_SPEED_SYNC};

/// The peak amplitude of the generated waveforms. Half of the full scale, like a real recording.
pub const AMPLITUDE: f64 = 16384.0;
/// The duration of silence before and after each recording, in seconds.
pub const SILENCE_SECS: f64 = 0.5;

#[inline]
fn sample(phase: f64) -> i16 {
    (phase.sin() * AMPLITUDE).round() as i16
}

/// One full sine cycle of `len` samples, positive half first.
fn sine_cycle(len: usize) -> Vec<i16> {
    (0..len).map(|i| sample(2.0 * PI * i as f64 / len as f64)).collect()
}

/// The positive half of a sine cycle of `2 * len` samples.
fn half_cycle(len: usize) -> Vec<i16> {
    (0..len).map(|i| sample(PI * i as f64 / len as f64)).collect()
}

fn bits_msb_first(byte: u8) -> impl Iterator<Item=bool> {
    (0..8).rev().map(move |n| byte & (1 << n) != 0)
}

/// Prepends the low speed lead-in: 255 zero bytes and the sync byte.
pub fn wrap_low_speed(bytes: &[u8]) -> Vec<u8> {
    let mut res = vec![0; LOW_SPEED_LEADER_LEN];
    res.push(LOW_SPEED_SYNC);
    res.extend_from_slice(bytes);
    res
}

/// Prepends the high speed header: 256 times `0x55` followed by `0x7F`.
pub fn wrap_high_speed(bytes: &[u8]) -> Vec<u8> {
    let mut res = vec![HIGH_SPEED_HEADER; HIGH_SPEED_HEADER_LEN];
    res.push(HIGH_SPEED_SYNC);
    res.extend_from_slice(bytes);
    res
}

/// Encodes `bytes`, including any lead-in (see [wrap_low_speed]), as 500 baud audio.
///
/// Each bit occupies two 1 ms slots: the first one always holds a clock pulse, the second one holds
/// a data pulse for `1` and silence for `0`. A pulse is a single sine cycle half a slot long,
/// centered in its slot.
pub fn encode_low_speed(bytes: &[u8], sample_rate: u32) -> Vec<i16> {
    encode_low_speed_with_baud(bytes, sample_rate, LOW_SPEED_BAUD)
}

/// Encodes `bytes` as low speed audio at 250, 500 or 1000 `baud`, see [encode_low_speed].
///
/// The slots shrink or stretch with the bit rate. Any other `baud` is encoded at its nominal bit rate.
pub fn encode_low_speed_with_baud(bytes: &[u8], sample_rate: u32, baud: u32) -> Vec<i16> {
    let slot_len = (sample_rate as f64 / low_speed_pulse_rate(baud) as f64 / 2.0).round() as usize;
    let pulse_len = slot_len / 2;
    let offset = (slot_len - pulse_len) / 2;
    let mut pulse = vec![0; slot_len];
    pulse[offset..offset + pulse_len].copy_from_slice(&sine_cycle(pulse_len));
    let silent = vec![0; slot_len];

    let silence = make_silence(SILENCE_SECS, sample_rate);
    let mut res = Vec::with_capacity(2 * silence.len() + bytes.len() * 16 * slot_len);
    res.extend_from_slice(&silence);
    for &byte in bytes {
        for bit in bits_msb_first(byte) {
            res.extend_from_slice(&pulse);
            res.extend_from_slice(if bit { &pulse } else { &silent });
        }
    }
    res.extend_from_slice(&silence);
    res
}

/// Encodes `bytes` as 1500 baud audio. The header is generated, so `bytes` should only contain the program.
///
/// Each bit is a single sine cycle: 0.72 ms for `0` and 0.34 ms for `1`. Every byte is preceded
/// by a `0` start bit, the first one stretched by 1 ms. A final positive half cycle completes
/// the last bit.
pub fn encode_high_speed(bytes: &[u8], sample_rate: u32) -> Vec<i16> {
    let rate = sample_rate as f64;
    let zero_len = (0.00072 * rate).round() as usize;
    let one_len = (0.00034 * rate).round() as usize;
    let zero = sine_cycle(zero_len);
    let one = sine_cycle(one_len);
    let long_zero = sine_cycle(zero_len + sample_rate as usize / 1000);

    let last = half_cycle(zero_len);
    let silence = make_silence(SILENCE_SECS, sample_rate);

    let mut parts: Vec<&[i16]> = vec![&silence[..]];
    let header = core::iter::repeat(HIGH_SPEED_HEADER).take(HIGH_SPEED_HEADER_LEN)
                 .chain(Some(HIGH_SPEED_SYNC));
    for byte in header {
        push_cycles(&mut parts, byte, &zero, &one);
    }
    for (index, &byte) in bytes.iter().enumerate() {
        parts.push(if index == 0 { &long_zero[..] } else { &zero[..] });
        push_cycles(&mut parts, byte, &zero, &one);
    }
    parts.push(&last);
    parts.push(&silence);
    concat_audio(&parts)
}

fn push_cycles<'a>(parts: &mut Vec<&'a [i16]>, byte: u8, zero: &'a [i16], one: &'a [i16]) {
    for bit in bits_msb_first(byte) {
        parts.push(if bit { one } else { zero });
    }
}
