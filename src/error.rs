/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Errors reported at the boundary of the tape decoding API.
use core::fmt;
use std::error::Error;

/// Invalid preconditions rejected before any decoding takes place.
///
/// Noise in the recording is never an error, see [BitType::Bad](crate::tape::BitType::Bad)
/// and [TapeDecoderState::Error](crate::tape::TapeDecoderState::Error) instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TapeError {
    /// There are no samples to decode.
    EmptySamples,
    /// The sample rate is too low to resolve the high speed cycles.
    InvalidSampleRate(u32),
    /// There is no low speed encoding at this baud rate.
    InvalidBaud(u32),
    /// The search would start past the last sample.
    InvalidStartFrame {
        frame: usize,
        len: usize
    }
}

/// The lowest sample rate the decoders accept, in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8000;

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::EmptySamples => f.write_str("no audio samples"),
            TapeError::InvalidSampleRate(rate) => write!(f,
                "sample rate {} Hz is below the minimum of {} Hz", rate, MIN_SAMPLE_RATE),
            TapeError::InvalidBaud(baud) => write!(f, "no low speed encoding at {} baud", baud),
            TapeError::InvalidStartFrame { frame, len } => write!(f,
                "start frame {} is out of range of {} samples", frame, len)
        }
    }
}

impl Error for TapeError {}

/// Checks the sample source shared by every decoder.
pub(crate) fn validate_samples(samples: &[i16], sample_rate: u32) -> Result<(), TapeError> {
    if samples.is_empty() {
        return Err(TapeError::EmptySamples)
    }
    if sample_rate < MIN_SAMPLE_RATE {
        return Err(TapeError::InvalidSampleRate(sample_rate))
    }
    Ok(())
}
