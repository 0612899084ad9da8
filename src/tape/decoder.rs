/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use core::cmp;
use log::{debug, info};
use crate::error::{validate_samples, TapeError};
use super::*;
use super::audio::{frame_to_timestamp, high_pass_filter};

/// The number of samples averaged by the high-pass filter applied to every tape.
pub const HIGH_PASS_FILTER_SIZE: usize = 500;
/// A longer pause between programs starts a new track.
const NEW_TRACK_GAP_SECS: usize = 5;

/// A recorded tape: the mono samples and their filtered copy fed to the decoders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tape {
    name: String,
    samples: Vec<i16>,
    filtered: Vec<i16>,
    sample_rate: u32
}

impl Tape {
    /// Creates a tape from the `samples` recorded at `sample_rate` Hz.
    ///
    /// Returns an error if there are no samples or the sample rate is too low.
    pub fn new<S: Into<String>>(name: S, samples: Vec<i16>, sample_rate: u32) -> Result<Self, TapeError> {
        validate_samples(&samples, sample_rate)?;
        let filtered = high_pass_filter(&samples, HIGH_PASS_FILTER_SIZE);
        Ok(Tape { name: name.into(), samples, filtered, sample_rate })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// The samples with the low frequency component removed.
    pub fn filtered_samples(&self) -> &[i16] {
        &self.filtered
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`, an empty tape can't be created.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Formats the position of `frame`, see [frame_to_timestamp].
    pub fn timestamp(&self, frame: usize, brief: bool) -> String {
        frame_to_timestamp(frame, self.sample_rate, brief)
    }
}

/// Finds and numbers all the programs on a [Tape].
///
/// Starting at the beginning of the tape, a candidate decoder of each encoding is fed the same samples,
/// until one of them recognizes its lead-in. That one alone decodes the rest of the program.
/// Searching resumes shortly after the program's end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decoder {
    pub config: DecoderConfig
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Decoder { config }
    }

    /// Creates a fresh candidate of each encoding: the low speed ones from the slowest, then the high speed one.
    pub fn candidates<'a>(&self, tape: &'a Tape) -> Vec<Box<dyn TapeDecoder + 'a>> {
        let mut res: Vec<Box<dyn TapeDecoder + 'a>> = LOW_SPEED_BAUDS.iter()
            .filter_map(|&baud| LowSpeedDecoder::from_tape_with_baud(tape, baud, self.config).ok())
            .map(|decoder| Box::new(decoder) as Box<dyn TapeDecoder + 'a>)
            .collect();
        res.push(Box::new(HighSpeedDecoder::from_tape(tape, self.config)));
        res
    }

    /// Decodes all the programs on the `tape`.
    pub fn decode(&self, tape: &Tape) -> Vec<Program> {
        self.decode_with_annotations(tape, &mut Vec::new())
    }

    /// Decodes all the programs on the `tape`, collecting the decoders' annotations.
    pub fn decode_with_annotations(
            &self,
            tape: &Tape,
            annotations: &mut Vec<WaveformAnnotation>
        ) -> Vec<Program>
    {
        let len = tape.len();
        let rate = tape.sample_rate() as usize;
        let mut programs: Vec<Program> = Vec::new();
        let mut track_number = 0;
        let mut copy_number = 0;
        let mut frame = 0;
        while frame < len {
            let mut candidates = self.candidates(tape);
            let mut winner = None;
            while frame < len {
                for candidate in candidates.iter_mut() {
                    candidate.handle_sample(frame, annotations);
                }
                frame += 1;
                winner = candidates.iter().position(|candidate|
                            candidate.state() != TapeDecoderState::Undecided);
                if winner.is_some() {
                    break
                }
            }
            let mut decoder = match winner {
                Some(index) => candidates.swap_remove(index),
                None => break
            };
            let detected_at = frame;
            debug!("{}: detected at {}", decoder.name(), tape.timestamp(frame, false));
            while frame < len && decoder.state() == TapeDecoderState::Detected {
                decoder.handle_sample(frame, annotations);
                frame += 1;
            }
            decoder.finish(frame);
            let mut program = Program::from_decoder(&*decoder);
            frame = cmp::max(program.end_frame + rate / 100, detected_at);
            if program.duration() <= rate / 10 {
                debug!("{}: skipped a short program at {}", decoder.name(), tape.timestamp(program.start_frame, false));
                continue
            }
            let new_track = programs.last().map_or(true, |last|
                                program.start_frame.saturating_sub(last.end_frame) > NEW_TRACK_GAP_SECS * rate);
            if new_track {
                track_number += 1;
                copy_number = 1;
            }
            else {
                copy_number += 1;
            }
            program.track_number = track_number;
            program.copy_number = copy_number;
            info!("{} at {}: {} bytes, {} errors, {}", program.label(), program.timestamp(tape.sample_rate()),
                  program.binary.len(), program.error_count(), decoder.state());
            programs.push(program);
        }
        programs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::audio::{concat_audio, make_silence};
    use crate::tape::encoder::*;

    #[test]
    fn tape_works() {
        assert_eq!(Tape::new("empty", Vec::new(), 44100), Err(TapeError::EmptySamples));
        assert_eq!(Tape::new("slow", vec![0; 10], 100), Err(TapeError::InvalidSampleRate(100)));
        let tape = Tape::new(String::from("dc"), vec![1000; 1000], 44100).unwrap();
        assert_eq!(tape.name(), "dc");
        assert_eq!(tape.len(), 1000);
        assert!(!tape.is_empty());
        assert_eq!(tape.sample_rate(), 44100);
        assert_eq!(tape.samples()[999], 1000);
        assert_eq!(tape.filtered_samples()[999], 0);
        assert_eq!(tape.timestamp(44100 * 2, true), "0:02");
    }

    #[test]
    fn decoder_finds_copies() {
        let copy = encode_low_speed(&wrap_low_speed(&[0xD3, 0xD3, 0xD3, b'A']), 44100);
        let other = encode_high_speed(&[1, 2, 3, 4], 44100);
        let samples = concat_audio(&[&copy[..], &copy[..], &make_silence(6.0, 44100)[..], &other[..]]);
        let tape = Tape::new("copies", samples, 44100).unwrap();
        let mut annotations = Vec::new();
        let programs = Decoder::default().decode_with_annotations(&tape, &mut annotations);
        let labels: Vec<_> = programs.iter().map(|prog| prog.label()).collect();
        assert_eq!(labels, [
            "Track 1, copy 1, 500 baud",
            "Track 1, copy 2, 500 baud",
            "Track 2, copy 1, 1500 baud"]);
        assert!(programs[0].is_basic_program());
        assert!(programs[0].same_binary_as(&programs[1]));
        assert_eq!(programs[2].binary, [1, 2, 3, 4]);
        assert!(programs.iter().all(|prog| prog.error_count() == 0));
        assert!(programs.windows(2).all(|w| w[0].end_frame < w[1].start_frame));
        assert_eq!(annotations.iter().filter(|ann| ann.text == "Sync").count(), 3);
    }

    #[test]
    fn decoder_finds_nothing_in_silence() {
        let tape = Tape::new("silence", make_silence(1.0, 44100), 44100).unwrap();
        assert!(Decoder::new(DecoderConfig::default()).decode(&tape).is_empty());
    }
}
