/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Sample rate aware helpers shared by the decoders and the encoders.
use core::fmt::Write;

/// The baud rate of the Level II BASIC low speed recordings.
pub const LOW_SPEED_BAUD: u32 = 500;
/// The baud rates of the low speed recordings: Level I, Level II and the doubled speed of some loaders.
pub const LOW_SPEED_BAUDS: [u32; 3] = [250, 500, 1000];
/// The baud rate of the high speed (Model III) recordings.
pub const HIGH_SPEED_BAUD: u32 = 1500;

/// Frame counts of every timing window used by the decoders, derived from the sample rate.
///
/// All the durations are in frames (samples of a single channel).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseTiming {
    pub sample_rate: u32,
    pub baud: u32,
    /// The duration of a single bit at the nominal speed.
    pub bit_period: usize,
    /// Low speed: the earliest data pulse after the clock pulse.
    pub data_min: usize,
    /// Low speed: the latest data pulse after the clock pulse.
    pub data_max: usize,
    /// Low speed: when the value of the bit is decided.
    pub decision: usize,
    /// Low speed: the latest next clock pulse.
    pub clock_timeout: usize,
    /// High speed: shorter cycles are noise.
    pub cycle_min: usize,
    /// High speed: shorter cycles are ones.
    pub one_max: usize,
    /// High speed: cycles up to this long are zeros.
    pub zero_max: usize,
    /// High speed: cycles up to this long are the stretched start bit.
    pub long_zero_max: usize,
    /// No pulses for this long after the program has been detected ends it.
    pub silence: usize,
}

impl PulseTiming {
    /// Derives the timing windows for the given `sample_rate` in Hz and `baud`.
    pub fn new(sample_rate: u32, baud: u32) -> Self {
        let rate = sample_rate as u64;
        let frames = |num: u64, den: u64| (rate * num / den) as usize;
        let bit_period = (rate / baud.max(1) as u64) as usize;
        let silence = if baud >= HIGH_SPEED_BAUD {
            frames(1, 50)
        }
        else {
            frames(1, 10)
        };
        PulseTiming {
            sample_rate,
            baud,
            bit_period,
            data_min: bit_period / 4,
            data_max: bit_period * 13 / 20,
            decision: bit_period * 3 / 4,
            clock_timeout: bit_period * 27 / 20,
            cycle_min: frames(15, 100_000),
            one_max: frames(1, 2000),
            zero_max: frames(92, 100_000),
            long_zero_max: frames(1, 500),
            silence
        }
    }
}

/// The actual pulse rate of a low speed recording at the nominal `baud`.
///
/// Level I recordings are called 250 baud, but their bits are about 280 per second.
#[inline]
pub fn low_speed_pulse_rate(baud: u32) -> u32 {
    if baud == 250 { 280 } else { baud }
}

/// Saturates `v` to the range of a 16-bit sample.
#[inline]
pub fn clamp_to_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Removes the low frequency component by subtracting the running average of the last `size` samples.
///
/// Until `size` samples have been seen the average is taken over `size` anyway,
/// which slightly favours the beginning of the recording.
pub fn high_pass_filter(samples: &[i16], size: usize) -> Vec<i16> {
    if size == 0 {
        return samples.to_vec()
    }
    let mut sum: i64 = 0;
    samples.iter().enumerate().map(|(i, &sample)| {
        sum += sample as i64;
        if i >= size {
            sum -= samples[i - size] as i64;
        }
        clamp_to_i16((sample as i64 - sum / size as i64) as i32)
    }).collect()
}

/// Formats the position of `frame` as a time since the beginning of the recording.
///
/// The `brief` format is `M:SS` (`H:MM:SS` past the first hour),
/// otherwise `H:MM:SS.mmm (frame N)`.
pub fn frame_to_timestamp(frame: usize, sample_rate: u32, brief: bool) -> String {
    let total_ms = frame as u64 * 1000 / sample_rate.max(1) as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let sec = total_sec % 60;
    let min = total_sec / 60 % 60;
    let hour = total_sec / 3600;
    let mut res = String::new();
    // writing to a String never fails
    let _ = if brief {
        if hour != 0 {
            write!(res, "{}:{:02}:{:02}", hour, min, sec)
        }
        else {
            write!(res, "{}:{:02}", min, sec)
        }
    }
    else {
        write!(res, "{}:{:02}:{:02}.{:03} (frame {})", hour, min, sec, ms, frame)
    };
    res
}

/// Returns `seconds` of silence.
pub fn make_silence(seconds: f64, sample_rate: u32) -> Vec<i16> {
    vec![0; (seconds * sample_rate as f64).round().max(0.0) as usize]
}

/// Joins the fragments of audio into a single buffer.
pub fn concat_audio<S: AsRef<[i16]>>(parts: &[S]) -> Vec<i16> {
    let len = parts.iter().map(|part| part.as_ref().len()).sum();
    let mut res = Vec::with_capacity(len);
    for part in parts {
        res.extend_from_slice(part.as_ref());
    }
    res
}
