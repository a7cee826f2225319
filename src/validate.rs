//! Turn the loosely-typed JSON produced by a note generator into a typed score.

use crate::{
    pitch::PitchClass,
    prelude::*,
    score::{LineRole, NoteEvent, Score, StructuredScore},
};
use serde_json::{Map, Value};

/// Velocity given to flat-score notes, which carry none of their own.
pub(crate) const FLAT_VELOCITY: u7 = u7::new(64);

/// Highest octave a flat-score note may use.
const MAX_FLAT_OCTAVE: i64 = 9;

/// Highest velocity percentage a structured-score note may use.
const MAX_VELOCITY_PERCENT: i64 = 100;

/// Locate the JSON document inside free-form text.
///
/// This is the contents of the first fenced code block tagged `json`, or the whole trimmed text
/// if there is no such block. The block may also sit on a single line, as in
/// ```` ```json [["C", 4, 500]] ``` ````.
pub fn extract_json(text: &str) -> &str {
    const FENCE: &str = "```";
    if let Some(open) = text.find("```json") {
        let after_tag = &text[open + "```json".len()..];
        let close = after_tag.find(FENCE);
        let body = match after_tag.find('\n') {
            Some(newline) if close.map_or(true, |close| newline < close) => {
                &after_tag[newline + 1..]
            }
            //Single-line block
            _ => after_tag,
        };
        if let Some(close) = body.find(FENCE) {
            return body[..close].trim();
        }
    }
    text.trim()
}

/// Validate the text produced by a note generator.
///
/// Two shapes are accepted, optionally wrapped in a fenced json block within surrounding prose:
///
/// - A bare array of `[note, octave, durationMs]` triples, where octaves are between 0 and 9.
///   This yields a `Score::Flat`.
/// - An object with `melodyLine`, `chordProgression` and `bassLine` arrays of
///   `[note, octave, durationMs, velocity]` quadruples. Melody notes must be in octave 6, chord
///   notes in octave 5 and bass notes in octave 4, and velocities are percentages between 0 and
///   100. This yields a `Score::Structured`.
///
/// Elements are checked in order, and the first violation is returned along with its index.
pub fn validate(text: &str) -> Result<Score> {
    let json = extract_json(text);
    let doc: Value = serde_json::from_str(json)
        .map_err(|err| Error::format(format!("json parsing error: {}", err)))?;
    let score = match doc {
        Value::Array(items) => Score::Flat(validate_line(&items, None)?),
        Value::Object(map) => Score::Structured(validate_structured(&map)?),
        _ => bail!(Error::format(
            "response must be an array of notes or an object with melodyLine, chordProgression and bassLine"
        )),
    };
    debug!("validated score with {} notes", score.note_count());
    Ok(score)
}

fn validate_structured(map: &Map<String, Value>) -> Result<StructuredScore> {
    let mut score = StructuredScore::default();
    for &role in LineRole::ALL.iter() {
        let items = match map.get(role.key()) {
            Some(Value::Array(items)) => items,
            Some(_) => bail!(Error::Format {
                line: Some(role),
                index: None,
                message: format!("{} must be an array of notes", role),
            }),
            None => bail!(Error::Format {
                line: Some(role),
                index: None,
                message: format!("missing {}", role),
            }),
        };
        *score.line_mut(role) = validate_line(items, Some(role))?;
    }
    Ok(score)
}

/// Validate the notes of a line, or of a flat score if `role` is `None`.
fn validate_line(items: &[Value], role: Option<LineRole>) -> Result<Vec<NoteEvent>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| validate_note(item, role).map_err(|err| err.at(role, idx)))
        .collect()
}

fn validate_note(item: &Value, role: Option<LineRole>) -> Result<NoteEvent> {
    let arity = if role.is_some() { 4 } else { 3 };
    let fields = match item.as_array() {
        Some(fields) if fields.len() == arity => fields,
        _ => bail!(Error::format(format!(
            "note must be an array of exactly {} elements",
            arity
        ))),
    };

    let pitch_class = match &fields[0] {
        Value::String(name) => name.parse::<PitchClass>()?,
        other => bail!(Error::range(format!(
            "note {} is not valid, must be one of: A, A#, B, C, C#, D, D#, E, F, F#, G, G#",
            other
        ))),
    };

    let octave = match (as_integer(&fields[1]), role) {
        (Some(octave), None) if (0..=MAX_FLAT_OCTAVE).contains(&octave) => octave as i32,
        (Some(octave), Some(role)) if octave == role.octave() as i64 => octave as i32,
        (_, None) => bail!(Error::range(format!(
            "octave {} must be an integer between 0 and {}",
            fields[1], MAX_FLAT_OCTAVE
        ))),
        (_, Some(role)) => bail!(Error::range(format!(
            "octave {} must be exactly {} in {}",
            fields[1],
            role.octave(),
            role
        ))),
    };

    let duration_ms = as_integer(&fields[2])
        .filter(|&dur| dur > 0)
        .and_then(|dur| u32::try_from(dur).ok())
        .ok_or_else(|| {
            Error::range(format!(
                "duration {} must be a positive integer",
                fields[2]
            ))
        })?;

    let velocity = match role {
        None => FLAT_VELOCITY,
        Some(_) => {
            let percent = as_integer(&fields[3])
                .filter(|vel| (0..=MAX_VELOCITY_PERCENT).contains(vel))
                .ok_or_else(|| {
                    Error::range(format!(
                        "velocity {} must be an integer between 0 and {}",
                        fields[3], MAX_VELOCITY_PERCENT
                    ))
                })?;
            scale_velocity(percent as u8)
        }
    };

    Ok(NoteEvent::new(pitch_class, octave, duration_ms, velocity))
}

/// Scale a velocity percentage to the MIDI velocity range.
pub(crate) fn scale_velocity(percent: u8) -> u7 {
    u7::new(((percent as u32 * 127 + 50) / 100) as u8)
}

/// Integral numbers, including floats with no fractional part such as `4.0`.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
            .map(|float| float as i64)
    })
}
