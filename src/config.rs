//! Runtime settings for the encoder.

use crate::{
    prelude::*,
    score::LineRole,
    timebase::{TimeBase, DEFAULT_DIVISION, REFERENCE_BPM},
};
use serde::Deserialize;

/// The channel and instrument a line of notes is played with.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct LineConfig {
    pub channel: u4,
    pub program: u7,
}
impl LineConfig {
    pub fn new(channel: u4, program: u7) -> LineConfig {
        LineConfig { channel, program }
    }
}

/// Settings for turning a score into a MIDI file.
///
/// The defaults write 480 ticks per beat at 120 BPM, with the melody, chords and bass on
/// channels 0, 1 and 2 playing programs 1, 2 and 3 respectively.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EncoderConfig {
    /// Ticks per beat.
    pub division: u15,
    /// Tempo written to the first track. Note durations in milliseconds are measured against it.
    pub tempo_bpm: u32,
    /// Omit repeated status bytes between consecutive channel messages.
    ///
    /// Only consecutive messages with the same status are shortened, such as the note-ons of a
    /// chord. Lines of notes played one after another alternate note-ons and note-offs, so they
    /// come out the same size.
    pub running_status: bool,
    pub flat: LineConfig,
    pub melody: LineConfig,
    pub chords: LineConfig,
    pub bass: LineConfig,
}
impl Default for EncoderConfig {
    fn default() -> EncoderConfig {
        EncoderConfig {
            division: u15::new(DEFAULT_DIVISION),
            tempo_bpm: REFERENCE_BPM,
            running_status: false,
            flat: LineConfig::new(u4::new(0), u7::new(0)),
            melody: LineConfig::new(u4::new(0), u7::new(1)),
            chords: LineConfig::new(u4::new(1), u7::new(2)),
            bass: LineConfig::new(u4::new(2), u7::new(3)),
        }
    }
}
impl EncoderConfig {
    /// The channel and instrument for a line of a structured score.
    pub fn line(&self, role: LineRole) -> &LineConfig {
        match role {
            LineRole::Melody => &self.melody,
            LineRole::Chords => &self.chords,
            LineRole::Bass => &self.bass,
        }
    }

    /// The timebase notes are laid out with.
    pub fn timebase(&self) -> TimeBase {
        TimeBase::new(self.division, self.tempo_bpm)
    }

    /// Check that the division and tempo can be written into a file.
    ///
    /// The tempo meta-event stores microseconds per beat in 24 bits, so the tempo must be between
    /// 4 and 60000000 BPM.
    pub fn check(&self) -> Result<()> {
        ensure!(
            self.division.as_int() > 0,
            Error::range("division must be between 1 and 32767, got 0")
        );
        ensure!(
            (4..=60_000_000).contains(&self.tempo_bpm),
            Error::range(format!(
                "tempo_bpm must be between 4 and 60000000, got {}",
                self.tempo_bpm
            ))
        );
        Ok(())
    }

    /// Load settings from a JSON document.
    ///
    /// Every key is optional and defaults to the value in `EncoderConfig::default()`, including
    /// the `channel` and `program` of each line, but unknown keys are rejected:
    ///
    /// ```json
    /// {
    ///   "division": 960,
    ///   "tempo_bpm": 90,
    ///   "running_status": true,
    ///   "bass": { "channel": 3, "program": 33 }
    /// }
    /// ```
    pub fn from_json(text: &str) -> Result<EncoderConfig> {
        let doc: ConfigDoc = serde_json::from_str(text)
            .map_err(|err| Error::format(format!("invalid encoder config: {}", err)))?;
        doc.check()
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigDoc {
    division: u16,
    tempo_bpm: u32,
    running_status: bool,
    flat: LineDoc,
    melody: LineDoc,
    chords: LineDoc,
    bass: LineDoc,
}
impl Default for ConfigDoc {
    fn default() -> ConfigDoc {
        let config = EncoderConfig::default();
        ConfigDoc {
            division: config.division.as_int(),
            tempo_bpm: config.tempo_bpm,
            running_status: config.running_status,
            flat: LineDoc::default(),
            melody: LineDoc::default(),
            chords: LineDoc::default(),
            bass: LineDoc::default(),
        }
    }
}
impl ConfigDoc {
    fn check(self) -> Result<EncoderConfig> {
        let defaults = EncoderConfig::default();
        let division = u15::try_from(self.division).ok_or_else(|| {
            Error::range(format!(
                "division must be between 1 and 32767, got {}",
                self.division
            ))
        })?;
        let config = EncoderConfig {
            division,
            tempo_bpm: self.tempo_bpm,
            running_status: self.running_status,
            flat: self.flat.check("flat", defaults.flat)?,
            melody: self.melody.check("melody", defaults.melody)?,
            chords: self.chords.check("chords", defaults.chords)?,
            bass: self.bass.check("bass", defaults.bass)?,
        };
        config.check()?;
        Ok(config)
    }
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct LineDoc {
    channel: Option<u8>,
    program: Option<u8>,
}
impl LineDoc {
    /// Fill in missing fields from `default` and check ranges.
    fn check(self, name: &str, default: LineConfig) -> Result<LineConfig> {
        let channel = match self.channel {
            Some(channel) => u4::try_from(channel).ok_or_else(|| {
                Error::range(format!(
                    "{} channel must be at most 15, got {}",
                    name, channel
                ))
            })?,
            None => default.channel,
        };
        let program = match self.program {
            Some(program) => u7::try_from(program).ok_or_else(|| {
                Error::range(format!(
                    "{} program must be at most 127, got {}",
                    name, program
                ))
            })?,
            None => default.program,
        };
        Ok(LineConfig::new(channel, program))
    }
}
