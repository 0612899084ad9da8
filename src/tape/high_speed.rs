/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use log::debug;
use crate::error::{validate_samples, TapeError};
use super::*;
use super::audio::frame_to_timestamp;
use super::bits::{BitCollector, BitHistory};

/// The repeated byte of the high speed header.
pub const HIGH_SPEED_HEADER: u8 = 0x55;
/// The number of header bytes.
pub const HIGH_SPEED_HEADER_LEN: usize = 256;
/// The byte ending the header.
pub const HIGH_SPEED_SYNC: u8 = 0x7F;
/// The last header byte followed by the sync byte.
const HEADER_PATTERN: u16 = (HIGH_SPEED_HEADER as u16) << 8 | HIGH_SPEED_SYNC as u16;

/// A cycle classified by its length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cycle {
    Short,
    One,
    Zero,
    /// Only valid as the first start bit.
    LongZero,
    Gap
}

/// A decoder of the high speed (1500 baud) recordings.
///
/// Every bit is a single cycle of the waveform and its value depends on the cycle's length.
/// Cycles are measured between the negative to positive crossings of the signal.
#[derive(Clone, Debug)]
pub struct HighSpeedDecoder<'a> {
    samples: &'a [i16],
    timing: PulseTiming,
    config: DecoderConfig,
    state: TapeDecoderState,
    last_frame: Option<usize>,
    /// The sign of the last sample out of the dead zone around zero.
    sign: i8,
    last_crossing: Option<usize>,
    recent: u16,
    /// The first frame of the current run of valid cycles.
    run_start: Option<usize>,
    expect_start_bit: bool,
    history: BitHistory,
    bits_seen: usize,
    last_bit: Option<BitData>,
    collector: BitCollector,
    start_frame: usize,
    end_frame: usize,
}

impl<'a> HighSpeedDecoder<'a> {
    /// Creates a decoder of `samples` recorded at `sample_rate` Hz.
    pub fn new(samples: &'a [i16], sample_rate: u32, config: DecoderConfig) -> Result<Self, TapeError> {
        validate_samples(samples, sample_rate)?;
        Ok(Self::new_unchecked(samples, sample_rate, config))
    }

    /// Creates a decoder of the filtered samples of the `tape`.
    pub fn from_tape(tape: &'a Tape, config: DecoderConfig) -> Self {
        Self::new_unchecked(tape.filtered_samples(), tape.sample_rate(), config)
    }

    fn new_unchecked(samples: &'a [i16], sample_rate: u32, config: DecoderConfig) -> Self {
        HighSpeedDecoder {
            samples,
            timing: PulseTiming::new(sample_rate, HIGH_SPEED_BAUD),
            config,
            state: TapeDecoderState::Undecided,
            last_frame: None,
            sign: 0,
            last_crossing: None,
            recent: 0,
            run_start: None,
            expect_start_bit: false,
            history: BitHistory::default(),
            bits_seen: 0,
            last_bit: None,
            collector: BitCollector::default(),
            start_frame: 0,
            end_frame: 0
        }
    }

    pub fn timing(&self) -> &PulseTiming {
        &self.timing
    }

    fn classify(&self, len: usize) -> Cycle {
        let t = &self.timing;
        if len < t.cycle_min {
            Cycle::Short
        }
        else if len < t.one_max {
            Cycle::One
        }
        else if len <= t.zero_max {
            Cycle::Zero
        }
        else if len <= t.long_zero_max {
            Cycle::LongZero
        }
        else {
            Cycle::Gap
        }
    }

    fn crossing(&mut self, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        let prev = match self.last_crossing.replace(frame) {
            Some(prev) => prev,
            None => return
        };
        let cycle = self.classify(frame - prev);
        match self.state {
            TapeDecoderState::Undecided => self.seek_header(cycle, prev, frame, annotations),
            TapeDecoderState::Detected => self.data_cycle(cycle, prev, frame, annotations),
            _ => {}
        }
    }

    fn seek_header(&mut self, cycle: Cycle, prev: usize, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        let bit_type = match cycle {
            Cycle::One => BitType::One,
            Cycle::Zero => BitType::Zero,
            _ => BitType::Bad
        };
        self.record(BitData::new(prev, frame, bit_type));
        if bit_type.is_bad() {
            self.recent = 0;
            self.run_start = None;
            return
        }
        self.recent = self.recent << 1 | bit_type.value() as u16;
        let run_start = *self.run_start.get_or_insert(prev);
        self.history.push(BitData::new(prev, frame, bit_type));
        if self.recent != HEADER_PATTERN {
            return
        }
        self.state = TapeDecoderState::Detected;
        self.start_frame = run_start;
        self.expect_start_bit = true;
        let mut sync_start = prev;
        for (index, sync) in self.history.drain().enumerate() {
            if index == 0 {
                sync_start = sync.start_frame;
            }
            self.collector.push_marker(BitData { bit_type: BitType::Sync, ..sync });
        }
        annotations.push(WaveformAnnotation::new("Sync", sync_start, frame));
        debug!("{}: program detected at {}", self.name(),
               frame_to_timestamp(self.start_frame, self.timing.sample_rate, false));
    }

    fn data_cycle(&mut self, cycle: Cycle, prev: usize, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        if cycle == Cycle::Gap {
            return self.stop(TapeDecoderState::Finished)
        }
        if self.expect_start_bit {
            let bit_type = match cycle {
                Cycle::Zero|Cycle::LongZero => BitType::Start,
                Cycle::One => {
                    annotations.push(WaveformAnnotation::new("Bad start bit", prev, frame));
                    self.record(BitData::new(prev, frame, BitType::Bad));
                    return self.stop(TapeDecoderState::Error)
                }
                _ => BitType::Bad
            };
            let bit = BitData::new(prev, frame, bit_type);
            self.record(bit);
            self.collector.push_marker(bit);
            self.expect_start_bit = false;
        }
        else {
            let bit_type = match cycle {
                Cycle::One => BitType::One,
                Cycle::Zero => BitType::Zero,
                _ => BitType::Bad
            };
            let bit = BitData::new(prev, frame, bit_type);
            self.record(bit);
            if self.collector.push_bit(bit).is_some() {
                self.expect_start_bit = true;
            }
        }
        if self.last_bit.map_or(false, |bit| bit.bit_type.is_bad()) {
            annotations.push(WaveformAnnotation::new("Bad bit", prev, frame));
        }
        if self.collector.bad_run >= self.config.max_consecutive_bad_bits {
            self.stop(TapeDecoderState::Error);
        }
    }

    #[inline]
    fn record(&mut self, bit: BitData) {
        self.bits_seen += 1;
        self.last_bit = Some(bit);
    }

    fn stop(&mut self, state: TapeDecoderState) {
        self.collector.trim_tail();
        self.state = state;
        self.end_frame = self.collector.end_frame()
                                       .unwrap_or(self.start_frame)
                                       .max(self.start_frame);
        debug!("{}: {} at {}, {} bytes, {} errors", self.name(), state,
               frame_to_timestamp(self.end_frame, self.timing.sample_rate, false),
               self.collector.binary.len(), self.collector.error_count);
    }
}

impl TapeDecoder for HighSpeedDecoder<'_> {
    fn name(&self) -> String {
        format!("{} baud", HIGH_SPEED_BAUD)
    }

    fn baud(&self) -> u32 {
        HIGH_SPEED_BAUD
    }

    fn sample_rate(&self) -> u32 {
        self.timing.sample_rate
    }

    fn samples_len(&self) -> usize {
        self.samples.len()
    }

    fn state(&self) -> TapeDecoderState {
        self.state
    }

    fn handle_sample(&mut self, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        if self.state.is_terminal() || self.last_frame.map_or(false, |last| frame <= last) {
            return
        }
        let sample = match self.samples.get(frame) {
            Some(&sample) => sample,
            None => return
        };
        self.last_frame = Some(frame);
        let threshold = self.config.high_speed_threshold;
        let sign = if sample > threshold {
            1
        }
        else if sample < threshold.saturating_neg() {
            -1
        }
        else {
            0
        };
        if self.sign < 0 && sign > 0 {
            self.crossing(frame, annotations);
        }
        if sign != 0 {
            self.sign = sign;
        }
        if self.state == TapeDecoderState::Detected {
            if let Some(last_crossing) = self.last_crossing {
                if frame - last_crossing > self.timing.silence {
                    self.stop(TapeDecoderState::Finished);
                }
            }
        }
    }

    fn finish(&mut self, _frame: usize) {
        if self.state == TapeDecoderState::Detected {
            self.stop(TapeDecoderState::Finished);
        }
    }

    fn binary(&self) -> &[u8] {
        &self.collector.binary
    }

    fn bit_data(&self) -> &[BitData] {
        &self.collector.bit_data
    }

    fn byte_data(&self) -> &[ByteData] {
        &self.collector.byte_data
    }

    fn start_frame(&self) -> usize {
        self.start_frame
    }

    fn end_frame(&self) -> usize {
        self.end_frame
    }

    fn error_count(&self) -> usize {
        self.collector.error_count
    }

    fn bits_seen(&self) -> usize {
        self.bits_seen
    }

    fn last_bit(&self) -> Option<BitData> {
        self.last_bit
    }

    fn last_frame(&self) -> Option<usize> {
        self.last_frame
    }

    fn reset(&mut self) {
        *self = Self::new_unchecked(self.samples, self.timing.sample_rate, self.config);
    }
}
