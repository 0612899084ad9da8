/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Cassette tape decoding.
//!
//! A [TapeDecoder] is a state machine fed one sample at a time. It starts [UNDECIDED][TapeDecoderState::Undecided],
//! hunting for the lead-in of its encoding. Once the lead-in is recognized the decoder is
//! [DETECTED][TapeDecoderState::Detected] and collects the program's bits until the recording ends
//! ([FINISHED][TapeDecoderState::Finished]) or the signal can no longer be framed
//! ([ERROR][TapeDecoderState::Error]).
//!
//! The [Decoder] runs a candidate of each encoding over a whole [Tape], numbering the programs it finds.
//!
//! ```
//! use trs80emu::tape::{Decoder, Tape, encoder::{encode_low_speed, wrap_low_speed}};
//!
//! let audio = encode_low_speed(&wrap_low_speed(b"HELLO"), 44100);
//! let tape = Tape::new("hello", audio, 44100).unwrap();
//! let programs = Decoder::default().decode(&tape);
//! assert_eq!(programs.len(), 1);
//! assert_eq!(programs[0].binary, b"HELLO");
//! assert_eq!(programs[0].label(), "Track 1, copy 1, 500 baud");
//! ```
use core::fmt;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

pub mod annotation;
pub mod audio;
pub mod bits;
mod decoder;
pub mod encoder;
mod high_speed;
mod low_speed;
pub mod program;

pub use annotation::WaveformAnnotation;
pub use audio::{PulseTiming, HIGH_SPEED_BAUD, LOW_SPEED_BAUD, LOW_SPEED_BAUDS};
pub use bits::{BitData, BitType, ByteData};
pub use decoder::{Decoder, Tape, HIGH_PASS_FILTER_SIZE};
pub use high_speed::*;
pub use low_speed::*;
pub use program::Program;

use crate::error::TapeError;

/// The state of a [TapeDecoder].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TapeDecoderState {
    /// Still looking for the lead-in.
    #[default]
    Undecided,
    /// Decoding the program.
    Detected,
    /// The program ended.
    Finished,
    /// The program could not be decoded any further. Whatever was decoded is kept.
    Error
}

impl TapeDecoderState {
    /// Returns `true` for `Finished` and `Error`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TapeDecoderState::Finished|TapeDecoderState::Error)
    }
}

impl fmt::Display for TapeDecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TapeDecoderState::Undecided => "undecided",
            TapeDecoderState::Detected => "detected",
            TapeDecoderState::Finished => "finished",
            TapeDecoderState::Error => "error",
        })
    }
}

/// Tunable decoder parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecoderConfig {
    /// The lowest threshold of a low speed pulse.
    pub min_pulse_threshold: i16,
    /// That many `Bad` bits in a row after the lead-in mean the synchronization is lost.
    pub max_consecutive_bad_bits: usize,
    /// A sample must be this far from zero to count as positive or negative in the high speed cycles.
    pub high_speed_threshold: i16,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            min_pulse_threshold: 2000,
            max_consecutive_bad_bits: 8,
            high_speed_threshold: 500
        }
    }
}

/// The interface of the sample-by-sample decoders of a single encoding.
pub trait TapeDecoder {
    /// A short description, e.g. `500 baud`.
    fn name(&self) -> String;
    fn baud(&self) -> u32;
    fn is_high_speed(&self) -> bool {
        self.baud() >= HIGH_SPEED_BAUD
    }
    fn sample_rate(&self) -> u32;
    /// The number of samples available to the decoder.
    fn samples_len(&self) -> usize;
    fn state(&self) -> TapeDecoderState;
    /// Processes the sample at `frame`. Frames must be fed in increasing order.
    ///
    /// Does nothing in a terminal state or if `frame` is not past the [last frame](TapeDecoder::last_frame).
    fn handle_sample(&mut self, frame: usize, annotations: &mut Vec<WaveformAnnotation>);
    /// The samples ended at `frame`. Closes the program if one was being decoded.
    fn finish(&mut self, frame: usize);
    fn binary(&self) -> &[u8];
    fn bit_data(&self) -> &[BitData];
    fn byte_data(&self) -> &[ByteData];
    /// The beginning of the lead-in of the detected program.
    fn start_frame(&self) -> usize;
    /// The end of the last byte of the program.
    fn end_frame(&self) -> usize;
    /// The number of `Bad` bits in the program.
    fn error_count(&self) -> usize;
    /// The number of bits classified so far, including the ones before the lead-in was recognized.
    fn bits_seen(&self) -> usize;
    /// The most recently classified bit.
    fn last_bit(&self) -> Option<BitData>;
    /// The last frame passed to [handle_sample](TapeDecoder::handle_sample).
    fn last_frame(&self) -> Option<usize>;
    /// Forgets everything decoded so far, returning to the `Undecided` state.
    fn reset(&mut self);

    /// Feeds samples from `start_frame` until the decoder reaches a terminal state or the samples end.
    ///
    /// Returns `Ok(None)` if no lead-in was found. A `start_frame` the decoder has already passed
    /// [resets](TapeDecoder::reset) it first.
    fn find_next_program(
            &mut self,
            start_frame: usize,
            annotations: &mut Vec<WaveformAnnotation>
        ) -> Result<Option<Program>, TapeError>
    {
        let len = self.samples_len();
        seek(self, start_frame)?;
        for frame in start_frame..len {
            self.handle_sample(frame, annotations);
            if self.state().is_terminal() {
                break
            }
        }
        match self.state() {
            TapeDecoderState::Undecided => return Ok(None),
            TapeDecoderState::Detected => self.finish(len),
            _ => {}
        }
        Ok(Some(Program::from_decoder(&*self)))
    }

    /// Returns the next `count` raw bits from `start_frame` as `0` and `1` characters, `X` for the `Bad` ones.
    ///
    /// Less bits are returned if the samples end or the decoder reaches a terminal state.
    /// Rewinding resets the decoder, like in [find_next_program](TapeDecoder::find_next_program).
    fn read_bits(&mut self, start_frame: usize, count: usize) -> Result<String, TapeError> {
        let len = self.samples_len();
        seek(self, start_frame)?;
        let mut annotations = Vec::new();
        let mut res = String::with_capacity(count);
        let mut seen = self.bits_seen();
        for frame in start_frame..len {
            if res.len() >= count || self.state().is_terminal() {
                break
            }
            self.handle_sample(frame, &mut annotations);
            if self.bits_seen() != seen {
                seen = self.bits_seen();
                if let Some(bit) = self.last_bit() {
                    res.push(match bit.bit_type {
                        BitType::One => '1',
                        BitType::Bad => 'X',
                        _ => '0'
                    });
                }
            }
        }
        Ok(res)
    }
}

/// Validates `frame` and resets the `decoder` if it already went past it.
fn seek<D: TapeDecoder + ?Sized>(decoder: &mut D, frame: usize) -> Result<(), TapeError> {
    let len = decoder.samples_len();
    if frame >= len {
        return Err(TapeError::InvalidStartFrame { frame, len })
    }
    if decoder.last_frame().map_or(false, |last| frame <= last) {
        decoder.reset();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_state_works() {
        assert_eq!(TapeDecoderState::default(), TapeDecoderState::Undecided);
        assert!(!TapeDecoderState::Undecided.is_terminal());
        assert!(!TapeDecoderState::Detected.is_terminal());
        assert!(TapeDecoderState::Finished.is_terminal());
        assert!(TapeDecoderState::Error.is_terminal());
        assert_eq!(TapeDecoderState::Detected.to_string(), "detected");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn decoder_config_serde() {
        let config: DecoderConfig = serde_json::from_str(r#"{"max_consecutive_bad_bits":16}"#).unwrap();
        assert_eq!(config, DecoderConfig { max_consecutive_bad_bits: 16, ..DecoderConfig::default() });
        let json = serde_json::to_string(&DecoderConfig::default()).unwrap();
        assert_eq!(json, r#"{"min_pulse_threshold":2000,"max_consecutive_bad_bits":8,"high_speed_threshold":500}"#);
    }
}
