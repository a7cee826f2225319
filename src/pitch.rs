//! Mapping between note names and MIDI key numbers.

use crate::prelude::*;
use core::str::FromStr;

/// One of the 12 semitones of the chromatic scale, spelled with sharps.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}
impl PitchClass {
    /// All pitch classes, in ascending order starting at `C`.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// The semitone offset of this pitch class above `C`.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// The pitch class at the given semitone offset above `C`, wrapping around every octave.
    #[inline]
    pub fn from_index(idx: u8) -> PitchClass {
        Self::ALL[(idx % 12) as usize]
    }

    /// The symbol for this pitch class, as it appears in scores.
    pub fn symbol(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}
impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
impl FromStr for PitchClass {
    type Err = Error;
    fn from_str(s: &str) -> Result<PitchClass> {
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.symbol() == s)
            .ok_or_else(|| {
                Error::range(format!(
                    "note \"{}\" is not valid, must be one of: A, A#, B, C, C#, D, D#, E, F, F#, G, G#",
                    s
                ))
            })
    }
}

/// The MIDI key number of a pitch class in a given octave, where `C4` is middle C (60).
///
/// Fails with a range error if the resulting number is outside `[0, 127]`.
pub fn pitch_number(class: PitchClass, octave: i32) -> Result<u7> {
    let key = class.index() as i64 + (octave as i64 + 1) * 12;
    u8::try_from(key)
        .ok()
        .and_then(u7::try_from)
        .ok_or_else(|| {
            Error::range(format!(
                "{}{} is outside the midi key range (key {})",
                class, octave, key
            ))
        })
}

/// Split a MIDI key number into its pitch class and octave.
pub fn decode_pitch(key: u7) -> (PitchClass, i32) {
    let key = key.as_int();
    (PitchClass::from_index(key), (key / 12) as i32 - 1)
}
