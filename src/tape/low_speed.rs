/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use log::debug;
use crate::error::{validate_samples, TapeError};
use super::*;
use super::audio::{frame_to_timestamp, low_speed_pulse_rate, LOW_SPEED_BAUDS};
use super::bits::{BitCollector, BitHistory};

/// The number of zero bytes written before the sync byte.
pub const LOW_SPEED_LEADER_LEN: usize = 255;
/// The byte ending the lead-in of a low speed recording.
pub const LOW_SPEED_SYNC: u8 = 0xA5;
/// A run of zero bytes this long followed by the sync byte is the lead-in of the next recording.
pub const MIN_LEADER_BYTES: usize = 250;
/// The number of zero bits that must precede the sync byte.
pub const MIN_LEADER_BITS: usize = 32;
/// The mask applied to the recent bits when looking for the lead-in.
const LEADER_MASK: u64 = (1 << (MIN_LEADER_BITS + 8)) - 1;

/// A decoder of the low speed (250, 500 or 1000 baud) recordings.
///
/// Each bit starts with a clock pulse. A data pulse following the clock pulse within the data window
/// makes the bit a `1`, otherwise it's a `0`. Pulses are detected when the signal crosses a threshold
/// upwards. The threshold follows a third of the previous pulse's peak.
#[derive(Clone, Debug)]
pub struct LowSpeedDecoder<'a> {
    samples: &'a [i16],
    baud: u32,
    timing: PulseTiming,
    config: DecoderConfig,
    state: TapeDecoderState,
    last_frame: Option<usize>,
    threshold: i32,
    armed: bool,
    peak: i32,
    last_pulse: Option<usize>,
    /// The clock pulse of the current bit.
    clock: Option<usize>,
    /// The frame when the clock was lost.
    gap: Option<usize>,
    data_pulse: bool,
    bad_pulse: bool,
    decided: bool,
    recent: u64,
    zero_run: usize,
    zero_run_start: usize,
    leader_start: usize,
    history: BitHistory,
    bits_seen: usize,
    last_bit: Option<BitData>,
    collector: BitCollector,
    zero_bytes: usize,
    start_frame: usize,
    end_frame: usize,
}

impl<'a> LowSpeedDecoder<'a> {
    /// Creates a 500 baud decoder of `samples` recorded at `sample_rate` Hz.
    pub fn new(samples: &'a [i16], sample_rate: u32, config: DecoderConfig) -> Result<Self, TapeError> {
        Self::with_baud(samples, sample_rate, LOW_SPEED_BAUD, config)
    }

    /// Creates a decoder of `samples` recorded at `sample_rate` Hz at one of [LOW_SPEED_BAUDS].
    pub fn with_baud(
            samples: &'a [i16],
            sample_rate: u32,
            baud: u32,
            config: DecoderConfig
        ) -> Result<Self, TapeError>
    {
        validate_samples(samples, sample_rate)?;
        check_baud(baud)?;
        Ok(Self::new_unchecked(samples, sample_rate, baud, config))
    }

    /// Creates a 500 baud decoder of the filtered samples of the `tape`.
    pub fn from_tape(tape: &'a Tape, config: DecoderConfig) -> Self {
        Self::new_unchecked(tape.filtered_samples(), tape.sample_rate(), LOW_SPEED_BAUD, config)
    }

    /// Creates a decoder of the filtered samples of the `tape` at one of [LOW_SPEED_BAUDS].
    pub fn from_tape_with_baud(tape: &'a Tape, baud: u32, config: DecoderConfig) -> Result<Self, TapeError> {
        check_baud(baud)?;
        Ok(Self::new_unchecked(tape.filtered_samples(), tape.sample_rate(), baud, config))
    }

    fn new_unchecked(samples: &'a [i16], sample_rate: u32, baud: u32, config: DecoderConfig) -> Self {
        LowSpeedDecoder {
            samples,
            baud,
            timing: PulseTiming::new(sample_rate, low_speed_pulse_rate(baud)),
            config,
            state: TapeDecoderState::Undecided,
            last_frame: None,
            threshold: config.min_pulse_threshold as i32,
            armed: true,
            peak: 0,
            last_pulse: None,
            clock: None,
            gap: None,
            data_pulse: false,
            bad_pulse: false,
            decided: false,
            recent: u64::MAX,
            zero_run: 0,
            zero_run_start: 0,
            leader_start: 0,
            history: BitHistory::default(),
            bits_seen: 0,
            last_bit: None,
            collector: BitCollector::default(),
            zero_bytes: 0,
            start_frame: 0,
            end_frame: 0
        }
    }

    pub fn timing(&self) -> &PulseTiming {
        &self.timing
    }

    /// Returns `true` on the rising edge of a pulse.
    fn detect_pulse(&mut self, sample: i32) -> bool {
        if self.armed {
            if sample >= self.threshold {
                self.armed = false;
                self.peak = sample;
                return true
            }
        }
        else {
            self.peak = self.peak.max(sample);
            if sample < self.threshold / 2 {
                self.armed = true;
                self.threshold = (self.peak / 3).max(self.config.min_pulse_threshold as i32);
            }
        }
        false
    }

    fn start_bit(&mut self, frame: usize) {
        self.clock = Some(frame);
        self.data_pulse = false;
        self.bad_pulse = false;
        self.decided = false;
    }

    fn pulse(&mut self, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        self.last_pulse = Some(frame);
        let clock = match self.clock {
            Some(clock) => clock,
            None => {
                if let Some(gap) = self.gap.take() {
                    if self.state == TapeDecoderState::Detected {
                        annotations.push(WaveformAnnotation::new("Lost clock", gap, frame));
                        self.push_bit(BitData::new(gap, frame, BitType::Bad), annotations);
                    }
                }
                return self.start_bit(frame)
            }
        };
        let t = &self.timing;
        let delta = frame - clock;
        if delta < t.data_min {
            self.bad_pulse = true;
        }
        else if delta <= t.data_max {
            if self.data_pulse {
                self.bad_pulse = true;
            }
            self.data_pulse = true;
        }
        else if delta <= t.decision {
            self.bad_pulse = true;
        }
        else {
            self.start_bit(frame);
        }
    }

    fn push_bit(&mut self, bit: BitData, annotations: &mut Vec<WaveformAnnotation>) {
        self.bits_seen += 1;
        self.last_bit = Some(bit);
        match self.state {
            TapeDecoderState::Undecided => self.seek_leader(bit, annotations),
            TapeDecoderState::Detected => {
                if bit.bit_type.is_bad() {
                    annotations.push(WaveformAnnotation::new("Bad bit", bit.start_frame, bit.end_frame));
                }
                if let Some(byte) = self.collector.push_bit(bit) {
                    self.push_byte(byte, bit.end_frame, annotations);
                }
                if self.state == TapeDecoderState::Detected &&
                   self.collector.bad_run >= self.config.max_consecutive_bad_bits
                {
                    self.stop(TapeDecoderState::Error, None);
                }
            }
            _ => {}
        }
    }

    fn seek_leader(&mut self, bit: BitData, annotations: &mut Vec<WaveformAnnotation>) {
        // a bad bit can't be a part of the lead-in
        let value = (bit.bit_type != BitType::Zero) as u64;
        self.recent = self.recent << 1 | value;
        if value == 0 {
            if self.zero_run == 0 {
                self.zero_run_start = bit.start_frame;
            }
            self.zero_run += 1;
            if self.zero_run == MIN_LEADER_BITS {
                self.leader_start = self.zero_run_start;
            }
        }
        else {
            self.zero_run = 0;
        }
        self.history.push(bit);
        if self.recent & LEADER_MASK != LOW_SPEED_SYNC as u64 {
            return
        }
        self.state = TapeDecoderState::Detected;
        self.start_frame = self.leader_start;
        let mut sync_start = bit.start_frame;
        for (index, sync) in self.history.drain().enumerate() {
            if index == 0 {
                sync_start = sync.start_frame;
            }
            self.collector.push_marker(BitData { bit_type: BitType::Sync, ..sync });
        }
        annotations.push(WaveformAnnotation::new("Sync", sync_start, bit.end_frame));
        debug!("{}: program detected at {}", self.name(),
               frame_to_timestamp(self.start_frame, self.timing.sample_rate, false));
    }

    fn push_byte(&mut self, byte: u8, frame: usize, annotations: &mut Vec<WaveformAnnotation>) {
        match byte {
            0 => self.zero_bytes += 1,
            LOW_SPEED_SYNC if self.zero_bytes >= MIN_LEADER_BYTES => {
                // the next recording follows without a pause
                let len = self.collector.binary.len() - 1 - self.zero_bytes;
                let next_start = self.collector.byte_data[len].start_frame;
                annotations.push(WaveformAnnotation::new("Next recording", next_start, frame));
                self.collector.truncate(len);
                self.stop(TapeDecoderState::Finished, Some(next_start));
            }
            _ => self.zero_bytes = 0
        }
    }

    fn stop(&mut self, state: TapeDecoderState, end_frame: Option<usize>) {
        self.collector.trim_tail();
        self.state = state;
        self.end_frame = end_frame.or_else(|| self.collector.end_frame())
                                  .unwrap_or(self.start_frame)
                                  .max(self.start_frame);
        debug!("{}: {} at {}, {} bytes, {} errors", self.name(), state,
               frame_to_timestamp(self.end_frame, self.timing.sample_rate, false),
               self.collector.binary.len(), self.collector.error_count);
    }
}

fn check_baud(baud: u32) -> Result<(), TapeError> {
    if LOW_SPEED_BAUDS.contains(&baud) {
        Ok(())
    }
    else {
        Err(TapeError::InvalidBaud(baud))
    }
}

impl TapeDecoder for LowSpeedDecoder<'_> {
    fn name(&self) -> String {
        format!("{} baud", self.baud)
    }

    fn baud(&self) -> u32 {
        self.baud
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
            Some(&sample) => sample as i32,
            None => return
        };
        self.last_frame = Some(frame);
        if self.detect_pulse(sample) {
            self.pulse(frame, annotations);
        }
        if let Some(clock) = self.clock {
            let delta = frame - clock;
            if !self.decided && delta >= self.timing.decision {
                self.decided = true;
                let bit_type = if self.bad_pulse {
                    BitType::Bad
                }
                else if self.data_pulse {
                    BitType::One
                }
                else {
                    BitType::Zero
                };
                self.push_bit(BitData::new(clock, frame, bit_type), annotations);
            }
            if delta > self.timing.clock_timeout {
                self.clock = None;
                self.gap = Some(frame);
            }
        }
        if self.state == TapeDecoderState::Detected {
            if let Some(last_pulse) = self.last_pulse {
                if frame - last_pulse > self.timing.silence {
                    self.stop(TapeDecoderState::Finished, None);
                }
            }
        }
    }

    fn finish(&mut self, _frame: usize) {
        if self.state == TapeDecoderState::Detected {
            self.stop(TapeDecoderState::Finished, None);
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
        *self = Self::new_unchecked(self.samples, self.timing.sample_rate, self.baud, self.config);
    }
}
