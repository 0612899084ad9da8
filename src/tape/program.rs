/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};
use super::{
    TapeDecoder,
    audio::{frame_to_timestamp, HIGH_SPEED_BAUD},
    bits::{BitData, BitType, ByteData},
    encoder::encode_high_speed
};

/// The first bytes of a tokenized BASIC program.
pub const BASIC_HEADER: [u8; 3] = [0xD3, 0xD3, 0xD3];

/// A program decoded from a tape.
///
/// Programs are numbered by the [Decoder](super::Decoder): consecutive recordings of the same
/// program are copies of one track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Program {
    pub track_number: u32,
    pub copy_number: u32,
    pub start_frame: usize,
    pub end_frame: usize,
    pub decoder_name: String,
    pub baud: u32,
    pub binary: Vec<u8>,
    pub bit_data: Vec<BitData>,
    pub byte_data: Vec<ByteData>
}

impl Program {
    /// Takes the program found by the `decoder`. The program is not numbered yet.
    pub fn from_decoder<D: TapeDecoder + ?Sized>(decoder: &D) -> Self {
        Program {
            track_number: 0,
            copy_number: 0,
            start_frame: decoder.start_frame(),
            end_frame: decoder.end_frame(),
            decoder_name: decoder.name(),
            baud: decoder.baud(),
            binary: decoder.binary().to_vec(),
            bit_data: decoder.bit_data().to_vec(),
            byte_data: decoder.byte_data().to_vec()
        }
    }

    pub fn is_high_speed(&self) -> bool {
        self.baud >= HIGH_SPEED_BAUD
    }

    /// E.g. `Track 1, copy 2, 500 baud`.
    pub fn label(&self) -> String {
        format!("Track {}, copy {}, {}", self.track_number, self.copy_number, self.decoder_name)
    }

    /// E.g. `T1 C2`.
    pub fn short_label(&self) -> String {
        format!("T{} C{}", self.track_number, self.copy_number)
    }

    /// A file name stem unique within a tape, e.g. `T1-C2`.
    pub fn pseudo_filename(&self) -> String {
        format!("T{}-C{}", self.track_number, self.copy_number)
    }

    /// Whether the binary is a tokenized BASIC program.
    pub fn is_basic_program(&self) -> bool {
        self.binary.starts_with(&BASIC_HEADER)
    }

    pub fn same_binary_as(&self, other: &Program) -> bool {
        self.binary == other.binary
    }

    /// The number of `Bad` bits.
    pub fn error_count(&self) -> usize {
        self.bit_data.iter().filter(|bit| bit.bit_type == BitType::Bad).count()
    }

    /// The brief time of the program's start.
    pub fn timestamp(&self, sample_rate: u32) -> String {
        frame_to_timestamp(self.start_frame, sample_rate, true)
    }

    /// The program's duration in frames.
    pub fn duration(&self) -> usize {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Returns the bytes for a high speed recording.
    ///
    /// Low speed programs end with two zero bytes, high speed ones with three.
    pub fn high_speed_bytes(&self) -> Vec<u8> {
        let mut bytes = self.binary.clone();
        if let [.., a, 0, 0] = self.binary[..] {
            if a != 0 {
                bytes.push(0);
            }
        }
        bytes
    }

    /// Renders a clean high speed recording of the program.
    pub fn to_high_speed_audio(&self, sample_rate: u32) -> Vec<i16> {
        encode_high_speed(&self.high_speed_bytes(), sample_rate)
    }
}
