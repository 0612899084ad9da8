/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Records of the decoded bits and bytes.
use std::collections::VecDeque;
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

/// The classification of a decoded bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitType {
    Zero,
    One,
    /// The start bit preceding each byte of a high speed recording.
    Start,
    /// A bit of the synchronization byte ending the lead-in.
    Sync,
    /// A pulse outside the timing windows, or a missing one.
    Bad
}

impl BitType {
    /// Returns the value shifted into the byte being assembled. A `Bad` bit reads as `0`.
    #[inline]
    pub fn value(self) -> u8 {
        (self == BitType::One) as u8
    }

    #[inline]
    pub fn is_bad(self) -> bool {
        self == BitType::Bad
    }
}

/// A single decoded bit with its position in the recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BitData {
    pub start_frame: usize,
    pub end_frame: usize,
    pub bit_type: BitType
}

impl BitData {
    pub fn new(start_frame: usize, end_frame: usize, bit_type: BitType) -> Self {
        BitData { start_frame, end_frame: end_frame.max(start_frame), bit_type }
    }
}

/// A decoded byte spanning its 8 data bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ByteData {
    pub value: u8,
    pub start_frame: usize,
    pub end_frame: usize
}

/// Accumulates the bits of a program after its lead-in has been detected.
#[derive(Clone, Debug, Default)]
pub(crate) struct BitCollector {
    pub binary: Vec<u8>,
    pub bit_data: Vec<BitData>,
    pub byte_data: Vec<ByteData>,
    pub error_count: usize,
    /// The number of `Bad` bits in a row.
    pub bad_run: usize,
    /// The length of `bit_data` after each completed byte.
    byte_ends: Vec<usize>,
    /// The number of markers preceding the first data bit.
    data_start: usize,
    value: u8,
    bits: u8,
    byte_start_frame: usize,
}

impl BitCollector {
    /// Records a structural bit (`Start` or `Sync`, or a `Bad` one in their place)
    /// that is not a part of any byte's value.
    pub fn push_marker(&mut self, bit: BitData) {
        if self.byte_ends.is_empty() && self.bits == 0 && self.data_start == self.bit_data.len() {
            self.data_start += 1;
        }
        self.count_errors(bit.bit_type);
        self.bit_data.push(bit);
    }

    /// Records a data bit. Returns the byte once its 8th bit was pushed.
    pub fn push_bit(&mut self, bit: BitData) -> Option<u8> {
        self.count_errors(bit.bit_type);
        if self.bits == 0 {
            self.byte_start_frame = bit.start_frame;
        }
        self.bit_data.push(bit);
        self.value = self.value << 1 | bit.bit_type.value();
        self.bits += 1;
        if self.bits < 8 {
            return None
        }
        let value = self.value;
        self.binary.push(value);
        self.byte_data.push(ByteData { value, start_frame: self.byte_start_frame, end_frame: bit.end_frame });
        self.byte_ends.push(self.bit_data.len());
        self.bits = 0;
        self.value = 0;
        Some(value)
    }

    /// Keeps only the first `len` bytes together with their bits.
    pub fn truncate(&mut self, len: usize) {
        let len = len.min(self.binary.len());
        let bits_len = match len {
            0 => self.data_start,
            n => self.byte_ends[n - 1]
        };
        self.binary.truncate(len);
        self.byte_data.truncate(len);
        self.byte_ends.truncate(len);
        self.bit_data.truncate(bits_len);
        self.bits = 0;
        self.value = 0;
        self.bad_run = 0;
        self.error_count = self.bit_data.iter().filter(|bit| bit.bit_type.is_bad()).count();
    }

    /// Drops the trailing `Bad` bits along with every byte they belong to, then the partial byte.
    pub fn trim_tail(&mut self) {
        let good_len = self.bit_data.iter().rposition(|bit| !bit.bit_type.is_bad())
                                           .map_or(0, |index| index + 1);
        let bytes = self.byte_ends.partition_point(|&end| end <= good_len);
        self.truncate(bytes);
    }

    /// The end of the last complete byte.
    pub fn end_frame(&self) -> Option<usize> {
        self.byte_data.last().map(|byte| byte.end_frame)
    }

    fn count_errors(&mut self, bit_type: BitType) {
        if bit_type.is_bad() {
            self.error_count += 1;
            self.bad_run += 1;
        }
        else {
            self.bad_run = 0;
        }
    }
}

/// The most recent bits seen before the lead-in was recognized.
#[derive(Clone, Debug, Default)]
pub(crate) struct BitHistory(VecDeque<BitData>);

impl BitHistory {
    const CAPACITY: usize = 8;

    pub fn push(&mut self, bit: BitData) {
        if self.0.len() == Self::CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(bit);
    }

    /// Takes the recorded bits, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item=BitData> + '_ {
        self.0.drain(..)
    }
}
