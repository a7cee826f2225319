//! The typed note lines that get written into a MIDI file.

use crate::{config::EncoderConfig, pitch::PitchClass, prelude::*};

/// The role of a note line within a structured score.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum LineRole {
    Melody,
    Chords,
    Bass,
}
impl LineRole {
    /// All line roles, in the order their tracks are written.
    pub const ALL: [LineRole; 3] = [LineRole::Melody, LineRole::Chords, LineRole::Bass];

    /// The key of this line in a structured score document.
    pub fn key(self) -> &'static str {
        match self {
            LineRole::Melody => "melodyLine",
            LineRole::Chords => "chordProgression",
            LineRole::Bass => "bassLine",
        }
    }

    /// The only octave notes in this line may be written in.
    pub fn octave(self) -> i32 {
        match self {
            LineRole::Melody => 6,
            LineRole::Chords => 5,
            LineRole::Bass => 4,
        }
    }
}
impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single note to be written.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct NoteEvent {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Absolute start in milliseconds.
    ///
    /// If `None`, the note starts right when the previous note of the same track ends.
    pub start_ms: Option<u32>,
    /// How long the note sounds, in milliseconds. Always strictly positive.
    pub duration_ms: u32,
    pub velocity: u7,
}
impl NoteEvent {
    /// A note that starts right after the previous one in its track.
    pub fn new(pitch_class: PitchClass, octave: i32, duration_ms: u32, velocity: u7) -> NoteEvent {
        NoteEvent {
            pitch_class,
            octave,
            start_ms: None,
            duration_ms,
            velocity,
        }
    }

    /// Make this note start at an absolute time instead.
    pub fn at(self, start_ms: u32) -> NoteEvent {
        NoteEvent {
            start_ms: Some(start_ms),
            ..self
        }
    }
}

/// A sequence of notes played on a single channel with a single instrument.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Track {
    pub channel: u4,
    pub program: u7,
    pub notes: Vec<NoteEvent>,
}
impl Track {
    pub fn new(channel: u4, program: u7, notes: Vec<NoteEvent>) -> Track {
        Track {
            channel,
            program,
            notes,
        }
    }
}

/// The three lines of a structured score.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StructuredScore {
    pub melody: Vec<NoteEvent>,
    pub chords: Vec<NoteEvent>,
    pub bass: Vec<NoteEvent>,
}
impl StructuredScore {
    pub fn line(&self, role: LineRole) -> &[NoteEvent] {
        match role {
            LineRole::Melody => &self.melody,
            LineRole::Chords => &self.chords,
            LineRole::Bass => &self.bass,
        }
    }

    pub fn line_mut(&mut self, role: LineRole) -> &mut Vec<NoteEvent> {
        match role {
            LineRole::Melody => &mut self.melody,
            LineRole::Chords => &mut self.chords,
            LineRole::Bass => &mut self.bass,
        }
    }
}

/// A validated score, in either of the two shapes a note generator may produce.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Score {
    /// A single flat sequence of notes.
    Flat(Vec<NoteEvent>),
    /// Separate melody, chord and bass lines.
    Structured(StructuredScore),
}
impl Score {
    /// Total amount of notes across all lines.
    pub fn note_count(&self) -> usize {
        match self {
            Score::Flat(notes) => notes.len(),
            Score::Structured(score) => LineRole::ALL
                .iter()
                .map(|&role| score.line(role).len())
                .sum(),
        }
    }

    /// Lay this score out as tracks, assigning channels and instruments from the configuration.
    ///
    /// A flat score becomes a single track. A structured score becomes one track per line, in
    /// melody, chords, bass order.
    pub fn to_tracks(&self, config: &EncoderConfig) -> Vec<Track> {
        match self {
            Score::Flat(notes) => vec![Track::new(
                config.flat.channel,
                config.flat.program,
                notes.clone(),
            )],
            Score::Structured(score) => LineRole::ALL
                .iter()
                .map(|&role| {
                    let line = config.line(role);
                    Track::new(line.channel, line.program, score.line(role).to_vec())
                })
                .collect(),
        }
    }
}
