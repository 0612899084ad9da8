/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// A labeled span of the waveform, reported by the decoders for a waveform display.
///
/// Annotations never influence decoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaveformAnnotation {
    pub text: String,
    /// The first frame of the span, inclusive.
    pub first_frame: usize,
    /// The last frame of the span, inclusive.
    pub last_frame: usize
}

impl WaveformAnnotation {
    pub fn new<S: Into<String>>(text: S, first_frame: usize, last_frame: usize) -> Self {
        WaveformAnnotation {
            text: text.into(),
            first_frame,
            last_frame: last_frame.max(first_frame)
        }
    }

    #[inline]
    pub fn contains(&self, frame: usize) -> bool {
        (self.first_frame..=self.last_frame).contains(&frame)
    }
}

impl fmt::Display for WaveformAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}: {}", self.first_frame, self.last_frame, self.text)
    }
}
