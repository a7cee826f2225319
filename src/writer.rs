//! Assemble tracks of notes into a Standard Midi File.

use crate::{
    config::EncoderConfig,
    pitch::pitch_number,
    prelude::*,
    primitive::{write_varlen_slice, Format},
    score::{Score, Track},
    timebase::TimeBase,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io;

/// The prefix of data URIs produced by [`to_data_uri`](fn.to_data_uri.html).
pub const MIDI_DATA_URI_PREFIX: &str = "data:audio/midi;base64,";

/// Below this many notes, tracks are encoded on the calling thread.
#[cfg(feature = "parallel")]
const PARALLEL_NOTE_THRESHOLD: usize = 4 * 1024;

/// An event positioned at an absolute tick, waiting to be written.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum TrackEvent {
    Tempo(u24),
    ProgramChange { channel: u4, program: u7 },
    NoteOff { channel: u4, key: u7 },
    NoteOn { channel: u4, key: u7, vel: u7 },
    EndOfTrack,
}
impl TrackEvent {
    /// Events at the same tick are written in ascending rank.
    ///
    /// Setup goes first, and a note ending at the same tick another one begins closes first.
    fn rank(&self) -> u8 {
        match self {
            TrackEvent::Tempo(..) | TrackEvent::ProgramChange { .. } => 0,
            TrackEvent::NoteOff { .. } => 1,
            TrackEvent::NoteOn { .. } => 2,
            TrackEvent::EndOfTrack => 3,
        }
    }

    /// Writes a single event, not including its delta-time.
    ///
    /// `running_status` keeps track of the last MIDI status. It is only used to omit status
    /// bytes if `compress` is set, but is always kept up to date.
    fn write(&self, running_status: &mut Option<u8>, compress: bool, out: &mut Vec<u8>) {
        //Running Status rules:
        // - MIDI Messages (0x80 ..= 0xEF) alter and use running status
        // - Meta Messages (0xFF) cancel and cannot use running status
        let (status, data, len) = match *self {
            TrackEvent::ProgramChange { channel, program } => {
                (0xC0 | channel.as_int(), [program.as_int(), 0], 1)
            }
            TrackEvent::NoteOff { channel, key } => (0x80 | channel.as_int(), [key.as_int(), 0], 2),
            TrackEvent::NoteOn { channel, key, vel } => {
                (0x90 | channel.as_int(), [key.as_int(), vel.as_int()], 2)
            }
            TrackEvent::Tempo(micros_per_beat) => {
                *running_status = None;
                out.extend_from_slice(&[0xFF, 0x51]);
                write_varlen_slice(&micros_per_beat.as_int().to_be_bytes()[1..], out);
                return;
            }
            TrackEvent::EndOfTrack => {
                *running_status = None;
                out.extend_from_slice(&[0xFF, 0x2F]);
                write_varlen_slice(&[], out);
                return;
            }
        };
        if !compress || Some(status) != *running_status {
            out.push(status);
        }
        *running_status = Some(status);
        out.extend_from_slice(&data[..len]);
    }
}

/// Lay out the events of a track at their absolute ticks, sorted in writing order.
///
/// Notes without an explicit start begin on the tick the previous note of the track ends on.
/// Note ends are rounded from their absolute time in milliseconds, so rounding errors never
/// accumulate along a track.
fn schedule_track(
    track_idx: usize,
    track: &Track,
    timebase: &TimeBase,
    with_tempo: bool,
) -> Result<Vec<(u28, TrackEvent)>> {
    let mut events = Vec::with_capacity(track.notes.len() * 2 + 2);
    if with_tempo {
        events.push((u28::new(0), TrackEvent::Tempo(timebase.micros_per_beat())));
    }
    events.push((
        u28::new(0),
        TrackEvent::ProgramChange {
            channel: track.channel,
            program: track.program,
        },
    ));

    let encoding_err = |index: usize, message: String| Error::Encoding {
        track: track_idx,
        index,
        message,
    };
    let to_tick = |index: usize, ticks: u64| {
        u32::try_from(ticks)
            .ok()
            .and_then(u28::try_from)
            .ok_or_else(|| encoding_err(index, format!("tick {} exceeds 28 bits", ticks)))
    };

    let mut cursor_ms = 0u64;
    let mut cursor_tick = 0u64;
    for (idx, note) in track.notes.iter().enumerate() {
        let key = pitch_number(note.pitch_class, note.octave).map_err(|err| match err {
            Error::Range { message, .. } => encoding_err(idx, message),
            other => other,
        })?;
        ensure!(
            note.duration_ms > 0,
            encoding_err(idx, "note duration must be positive".to_string())
        );
        let (start_ms, start_tick) = match note.start_ms {
            Some(start_ms) => (start_ms as u64, timebase.ms_to_ticks(start_ms as f64)),
            //Sequential notes start exactly where the previous one ended
            None => (cursor_ms, cursor_tick),
        };
        let end_ms = start_ms + note.duration_ms as u64;
        //Never let a note collapse to zero ticks, or its note-off would sort before its note-on
        let end_tick = timebase.ms_to_ticks(end_ms as f64).max(start_tick + 1);
        let start = to_tick(idx, start_tick)?;
        let end = to_tick(idx, end_tick)?;
        //A zero-velocity note-on would read back as a note-off
        let vel = u7::new(note.velocity.as_int().max(1));
        events.push((
            start,
            TrackEvent::NoteOn {
                channel: track.channel,
                key,
                vel,
            },
        ));
        events.push((
            end,
            TrackEvent::NoteOff {
                channel: track.channel,
                key,
            },
        ));
        cursor_ms = end_ms;
        cursor_tick = end_tick;
    }

    //Stable sort, so simultaneous events of the same rank keep their insertion order
    events.sort_by_key(|(tick, ev)| (*tick, ev.rank()));
    let last_tick = events.last().map(|(tick, _)| *tick).unwrap_or_default();
    events.push((last_tick, TrackEvent::EndOfTrack));
    Ok(events)
}

/// Write a track chunk into a `Vec`.
///
/// The `Vec` should be empty.
fn write_track(
    track_idx: usize,
    track: &Track,
    config: &EncoderConfig,
    out: &mut Vec<u8>,
) -> Result<()> {
    let events = schedule_track(track_idx, track, &config.timebase(), track_idx == 0)?;
    out.extend_from_slice(b"MTrk\0\0\0\0");
    out.reserve(events.len() * 4);
    let mut running_status = None;
    let mut last_tick = 0;
    for (tick, ev) in events.iter() {
        u28::new(tick.as_int() - last_tick).write_varlen(out);
        last_tick = tick.as_int();
        ev.write(&mut running_status, config.running_status, out);
    }
    let len = u32::try_from(out.len() - 8).map_err(|_| Error::Encoding {
        track: track_idx,
        index: track.notes.len(),
        message: "midi chunk size exceeds 32 bit range".to_string(),
    })?;
    out[4..8].copy_from_slice(&len.to_be_bytes());
    debug!(
        "encoded track {} with {} notes into {} bytes",
        track_idx,
        track.notes.len(),
        out.len()
    );
    Ok(())
}

/// Write a header chunk into a writer.
fn write_header<W: io::Write>(config: &EncoderConfig, track_count: usize, out: &mut W) -> Result<()> {
    let track_count_u16 = u16::try_from(track_count).map_err(|_| Error::Encoding {
        track: track_count,
        index: 0,
        message: "track count exceeds 16 bit range".to_string(),
    })?;
    let mut header_chunk = [0; 4 + 4 + 6];
    header_chunk[0..4].copy_from_slice(&b"MThd"[..]);
    header_chunk[4..8].copy_from_slice(&6u32.to_be_bytes()[..]);
    header_chunk[8..10].copy_from_slice(&Format::for_track_count(track_count).encode()[..]);
    header_chunk[10..12].copy_from_slice(&track_count_u16.to_be_bytes()[..]);
    header_chunk[12..14].copy_from_slice(&config.division.as_int().to_be_bytes()[..]);
    out.write_all(&header_chunk[..])?;
    Ok(())
}

/// Encode the tracks as a complete MIDI file into the given writer.
///
/// Writes a single-track file if there is exactly one track, and a parallel file otherwise.
/// The first track also carries the tempo. Tracks are written in the given order.
///
/// Fails without recovery if there are no tracks, if the configured timebase is out of range, on
/// the first note that
/// cannot be encoded, or if the writer fails.
/// If the `parallel` feature is enabled, large inputs are encoded on multiple threads.
pub fn write<W: io::Write>(tracks: &[Track], config: &EncoderConfig, out: &mut W) -> Result<()> {
    config.check()?;
    ensure!(
        !tracks.is_empty(),
        Error::Encoding {
            track: 0,
            index: 0,
            message: "a midi file needs at least one track".to_string(),
        }
    );
    //Write the header first
    write_header(config, tracks.len(), out)?;

    //Try to write the file in parallel
    #[cfg(feature = "parallel")]
    {
        let note_count: usize = tracks.iter().map(|track| track.notes.len()).sum();
        if tracks.len() > 1 && note_count >= PARALLEL_NOTE_THRESHOLD {
            use rayon::prelude::*;

            //Write out the tracks in parallel into several different buffers
            let track_chunks = tracks
                .par_iter()
                .enumerate()
                .map(|(idx, track)| {
                    let mut track_chunk = Vec::with_capacity(8 * 1024);
                    write_track(idx, track, config, &mut track_chunk)?;
                    Ok(track_chunk)
                })
                .collect::<Vec<Result<Vec<u8>>>>();

            //Write down the tracks sequentially and in order, stopping at the first error
            for track_chunk in track_chunks {
                out.write_all(&track_chunk?)?;
            }
            return Ok(());
        }
    }

    //Fall back to writing the file serially
    //Write tracks into a reusable buffer before writing them out
    let mut track_chunk = Vec::with_capacity(8 * 1024);
    for (idx, track) in tracks.iter().enumerate() {
        //Write tracks into a buffer first so that chunk lengths can be written
        write_track(idx, track, config, &mut track_chunk)?;
        out.write_all(&track_chunk[..])?;
        track_chunk.clear();
    }
    Ok(())
}

/// Encode the tracks as a complete MIDI file in memory.
pub fn encode(tracks: &[Track], config: &EncoderConfig) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(14 + tracks.len() * 64);
    write(tracks, config, &mut out)?;
    Ok(out)
}

/// Encode a validated score as a complete MIDI file in memory.
///
/// See [`Score::to_tracks`](enum.Score.html#method.to_tracks) for how lines map to tracks.
pub fn encode_score(score: &Score, config: &EncoderConfig) -> Result<Vec<u8>> {
    encode(&score.to_tracks(config), config)
}

/// Wrap raw MIDI file bytes as a `data:audio/midi;base64,...` URI.
pub fn to_data_uri(bytes: &[u8]) -> String {
    let mut uri = String::with_capacity(MIDI_DATA_URI_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    uri.push_str(MIDI_DATA_URI_PREFIX);
    STANDARD.encode_string(bytes, &mut uri);
    uri
}
