//! Read a Standard Midi File back into a time-ordered list of notes.

use crate::{
    pitch::{decode_pitch, PitchClass},
    prelude::*,
    primitive::{read_varlen_slice, Format},
    riff,
    timebase::TimeBase,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;

/// Below this many bytes of track data, tracks are decoded on the calling thread.
#[cfg(feature = "parallel")]
const PARALLEL_BYTE_THRESHOLD: usize = 3 * 1024;

/// A note reconstructed from a note-on and its matching note-off.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DecodedNote {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Start time in beats.
    pub start: f64,
    /// Duration in beats. Always strictly positive.
    pub duration: f64,
    pub channel: u4,
    pub key: u7,
    /// Velocity of the note-on.
    pub velocity: u7,
    pub start_tick: u64,
    pub duration_ticks: u64,
}

/// A tempo meta-event found in the file.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TempoChange {
    pub tick: u64,
    pub beat: f64,
    pub micros_per_beat: u24,
}
impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_beat.as_int().max(1) as f64
    }
}

/// Everything that could be read out of a MIDI file.
#[derive(Clone, PartialEq, Debug)]
pub struct Decoded {
    pub format: Format,
    /// Ticks per beat.
    pub division: u15,
    /// The amount of track chunks actually found in the file.
    pub track_count: usize,
    /// Tempo changes across all tracks, sorted by tick.
    pub tempo_changes: Vec<TempoChange>,
    /// Completed notes across all tracks, sorted by start time.
    ///
    /// Notes starting at the same time are kept in file order.
    pub notes: Vec<DecodedNote>,
}
impl Decoded {
    /// The time at which the last note ends, in beats.
    pub fn total_beats(&self) -> f64 {
        self.notes
            .iter()
            .map(|note| note.start + note.duration)
            .fold(0.0, f64::max)
    }
}

/// Read and check the header chunk, which should be the very first chunk in the file.
///
/// Returns the format, the declared track count and the division.
fn read_header(raw: &mut &[u8]) -> ParseResult<(Format, u16, u15)> {
    let id = raw
        .split_checked(4)
        .ok_or(err_invalid!("failed to read header chunkid"))?;
    ensure!(id == b"MThd", err_invalid!("missing MThd header chunk"));
    let len = u32::read(raw).context(err_invalid!("failed to read header chunklen"))?;
    ensure!(len >= 6, err_invalid!("header chunk is too short"));
    if cfg!(feature = "strict") {
        ensure!(len == 6, err_malformed!("header chunk is not 6 bytes long"));
    }
    let mut header = raw
        .split_checked(len as usize)
        .ok_or(err_invalid!("reached eof before header chunk ended"))?;
    let format = Format::read(&mut header)?;
    let track_count = u16::read(&mut header)?;
    let division = u16::read(&mut header)?;
    ensure!(
        bit_range(division, 15..16) == 0,
        err_invalid!("smpte timecode division is not supported")
    );
    ensure!(division != 0, err_invalid!("division is zero"));
    Ok((format, track_count, u15::new(division)))
}

/// Split the chunks after the header into track bodies, skipping alien chunks.
fn split_tracks<'a>(mut raw: &'a [u8]) -> ParseResult<Vec<&'a [u8]>> {
    let mut tracks = Vec::new();
    while !raw.is_empty() {
        let id = raw
            .split_checked(4)
            .ok_or(err_invalid!("failed to read chunkid"))?;
        let len = u32::read(&mut raw).context(err_invalid!("failed to read chunklen"))?;
        let chunkdata = raw
            .split_checked(len as usize)
            .ok_or(err_invalid!("reached eof before chunk ended"))?;
        match id {
            b"MTrk" => tracks.push(chunkdata),
            b"MThd" => {
                if cfg!(feature = "strict") {
                    bail!(err_malformed!("found duplicate header"));
                }
                trace!("ignoring duplicate header chunk");
            }
            //Unknown chunk, just ignore and read the next one
            _ => trace!("skipping alien chunk {:?} of {} bytes", id, len),
        }
    }
    Ok(tracks)
}

/// The events of a track that matter for note reconstruction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum EventKind {
    NoteOn { channel: u4, key: u7, vel: u7 },
    NoteOff { channel: u4, key: u7 },
    Tempo(u24),
    EndOfTrack,
    /// Any other channel message, meta-message or sysex, already skipped over.
    Other,
}

/// An iterator over the delta-times and events of a single track.
#[derive(Clone, Debug)]
struct EventIter<'a> {
    raw: &'a [u8],
    running_status: Option<u8>,
}
impl<'a> EventIter<'a> {
    fn new(raw: &[u8]) -> EventIter {
        EventIter {
            raw,
            running_status: None,
        }
    }

    /// Advances past one event and updates the running status.
    fn read_event(&mut self) -> ParseResult<(u28, EventKind)> {
        let raw = &mut self.raw;
        let delta = u28::read_varlen(raw).context(err_invalid!("failed to read event deltatime"))?;
        //Read status
        let mut status = *raw.get(0).ok_or(err_invalid!("failed to read status"))?;
        if status < 0x80 {
            //Running status!
            status = self.running_status.ok_or(err_invalid!(
                "event missing status with no running status active"
            ))?;
        } else {
            *raw = &raw[1..];
        }
        let kind = match status {
            0x80..=0xEF => {
                self.running_status = Some(status);
                //Channel messages have a fixed length depending on their status
                const LENGTH_BY_STATUS: [usize; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 1, 1, 2, 0];
                let data = raw
                    .split_checked(LENGTH_BY_STATUS[(status >> 4) as usize])
                    .ok_or(err_invalid!("truncated midi message"))?;
                let data = data
                    .iter()
                    .map(|&byte| u7::check_int(byte))
                    .collect::<StdResult<Vec<u7>, _>>()?;
                let channel = u4::new(status);
                match status >> 4 {
                    0x9 if data[1] > 0 => EventKind::NoteOn {
                        channel,
                        key: data[0],
                        vel: data[1],
                    },
                    //A note-on with zero velocity is a note-off
                    0x8 | 0x9 => EventKind::NoteOff {
                        channel,
                        key: data[0],
                    },
                    _ => EventKind::Other,
                }
            }
            0xFF => {
                self.running_status = None;
                let type_byte =
                    u8::read(raw).context(err_invalid!("failed to read meta message type"))?;
                let mut data = read_varlen_slice(raw)
                    .context(err_invalid!("failed to read meta message data"))?;
                match type_byte {
                    0x2F => EventKind::EndOfTrack,
                    0x51 if data.len() >= 3 => EventKind::Tempo(u24::read(&mut data)?),
                    _ => EventKind::Other,
                }
            }
            0xF0 | 0xF7 => {
                self.running_status = None;
                read_varlen_slice(raw).context(err_invalid!("failed to read sysex event"))?;
                EventKind::Other
            }
            0xF1..=0xF6 => bail!(err_invalid!(
                "standard midi files cannot contain system common events"
            )),
            0xF8..=0xFE => bail!(err_invalid!(
                "standard midi files cannot contain system realtime events"
            )),
            0x00..=0x7F => unreachable!("running status always has the top bit set"),
        };
        Ok((delta, kind))
    }
}
impl<'a> Iterator for EventIter<'a> {
    type Item = ParseResult<(u28, EventKind)>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.raw.is_empty() {
            None
        } else {
            let read_result = self.read_event();
            if read_result.is_err() {
                //Do not read on from the middle of a broken event
                self.raw = &[];
            }
            Some(read_result)
        }
    }
}

/// The notes and tempo changes of a single track.
#[derive(Default)]
struct TrackNotes {
    notes: Vec<DecodedNote>,
    tempo_changes: Vec<TempoChange>,
}

/// Pair up the note-ons and note-offs of a track chunk body.
///
/// Notes come out sorted by start tick, and notes starting on the same tick keep the order of
/// their note-ons. Note-ons still open at the end of the track are dropped.
fn decode_track(raw: &[u8], timebase: &TimeBase) -> ParseResult<TrackNotes> {
    let mut out = TrackNotes::default();
    //Open note-ons by (channel, key), along with their start tick, velocity and note-on order
    let mut active: HashMap<(u4, u7), (u64, u7, usize)> = HashMap::new();
    let mut paired: Vec<(usize, DecodedNote)> = Vec::new();
    let mut note_ons = 0;
    let mut current_tick = 0u64;
    let mut events = EventIter::new(raw);
    let mut ended = false;
    for event in &mut events {
        let (delta, kind) = event?;
        current_tick += delta.as_int() as u64;
        match kind {
            EventKind::NoteOn { channel, key, vel } => {
                active.insert((channel, key), (current_tick, vel, note_ons));
                note_ons += 1;
            }
            EventKind::NoteOff { channel, key } => {
                if let Some((start_tick, velocity, seq)) = active.remove(&(channel, key)) {
                    let duration_ticks = current_tick - start_tick;
                    if duration_ticks > 0 {
                        let (pitch_class, octave) = decode_pitch(key);
                        paired.push((seq, DecodedNote {
                            pitch_class,
                            octave,
                            start: timebase.ticks_to_beats(start_tick),
                            duration: timebase.ticks_to_beats(duration_ticks),
                            channel,
                            key,
                            velocity,
                            start_tick,
                            duration_ticks,
                        }));
                    }
                }
            }
            EventKind::Tempo(micros_per_beat) => out.tempo_changes.push(TempoChange {
                tick: current_tick,
                beat: timebase.ticks_to_beats(current_tick),
                micros_per_beat,
            }),
            EventKind::EndOfTrack => {
                ended = true;
                break;
            }
            EventKind::Other => {}
        }
    }
    if cfg!(feature = "strict") {
        ensure!(ended, err_malformed!("track is missing its end-of-track event"));
        ensure!(
            events.raw.is_empty(),
            err_malformed!("track has data after its end-of-track event")
        );
    }
    if !active.is_empty() {
        trace!("dropping {} unmatched note-ons", active.len());
    }
    paired.sort_by_key(|(seq, note)| (note.start_tick, *seq));
    out.notes = paired.into_iter().map(|(_, note)| note).collect();
    Ok(out)
}

/// Decode all tracks, keeping the results in track order.
fn decode_tracks(tracks: &[&[u8]], timebase: &TimeBase) -> ParseResult<Vec<TrackNotes>> {
    //Attempt to use multiple threads if possible and enabled
    #[cfg(feature = "parallel")]
    {
        let total_bytes: usize = tracks.iter().map(|track| track.len()).sum();
        if tracks.len() > 1 && total_bytes >= PARALLEL_BYTE_THRESHOLD {
            use rayon::prelude::*;

            let decoded = tracks
                .par_iter()
                .map(|track| decode_track(track, timebase))
                .collect::<Vec<_>>();
            //Report the error of the earliest track, as the serial path would
            return decoded
                .into_iter()
                .enumerate()
                .map(|(idx, track)| {
                    track
                        .context(err_invalid!("failed to read track chunk"))
                        .map_err(|err| log_track_err(idx, err))
                })
                .collect();
        }
    }
    //Fall back to single-threaded
    tracks
        .iter()
        .enumerate()
        .map(|(idx, track)| {
            decode_track(track, timebase)
                .context(err_invalid!("failed to read track chunk"))
                .map_err(|err| log_track_err(idx, err))
        })
        .collect()
}

fn log_track_err(idx: usize, err: ParseError) -> ParseError {
    debug!("track {} failed to decode: {}", idx, err.root());
    err
}

/// Decode a MIDI file into its notes, failing on the first parse error.
///
/// Each track chunk is scanned with its own tick counter and open-note map: a note-on is
/// paired with the next note-off (or zero-velocity note-on) for the same channel and key on
/// the same track. Note-offs without a matching note-on and note-ons that are never closed are
/// ignored, as are notes of zero length.
///
/// Files wrapped in an RMID container are unwrapped first.
pub fn try_decode(raw: &[u8]) -> ParseResult<Decoded> {
    let mut raw = riff::unwrap(raw).unwrap_or(raw);
    let (format, track_count_hint, division) =
        read_header(&mut raw).context(err_invalid!("invalid midi header"))?;
    let tracks = split_tracks(raw)?;
    debug!(
        "reading {:?} midi file with {} tracks at {} ticks per beat",
        format,
        tracks.len(),
        division
    );
    if cfg!(feature = "strict") {
        ensure!(
            track_count_hint as usize == tracks.len(),
            err_malformed!("file has a different amount of tracks than declared")
        );
        ensure!(
            format != Format::SingleTrack || tracks.len() == 1,
            err_malformed!("singletrack format file has multiple tracks")
        );
    } else if track_count_hint as usize != tracks.len() {
        debug!(
            "file declares {} tracks but contains {}",
            track_count_hint,
            tracks.len()
        );
    }

    let timebase = TimeBase::with_division(division);
    let mut notes = Vec::new();
    let mut tempo_changes = Vec::new();
    for track in decode_tracks(&tracks, &timebase)? {
        notes.extend(track.notes);
        tempo_changes.extend(track.tempo_changes);
    }
    //Stable sorts, so that ties keep file order
    notes.sort_by_key(|note| note.start_tick);
    tempo_changes.sort_by_key(|tempo| tempo.tick);
    Ok(Decoded {
        format,
        division,
        track_count: tracks.len(),
        tempo_changes,
        notes,
    })
}

/// Decode a MIDI file into its notes, sorted by start time.
///
/// This never fails: if the file cannot be read, the error is logged and no notes are returned.
pub fn decode(raw: &[u8]) -> Vec<DecodedNote> {
    match try_decode(raw) {
        Ok(decoded) => decoded.notes,
        Err(err) => {
            warn!("failed to decode midi data: {}", err.chain());
            Vec::new()
        }
    }
}

/// Get the raw bytes out of a base64 data URI, or out of a bare base64 payload.
pub(crate) fn data_uri_payload(uri: &str) -> ParseResult<Vec<u8>> {
    let uri = uri.trim();
    let payload = match uri.strip_prefix("data:") {
        Some(rest) => {
            let comma = rest
                .find(',')
                .ok_or(err_invalid!("data uri has no payload"))?;
            ensure!(
                rest[..comma].ends_with(";base64"),
                err_invalid!("data uri is not base64 encoded")
            );
            &rest[comma + 1..]
        }
        None => uri,
    };
    STANDARD
        .decode(payload)
        .map_err(|_| err_invalid!("invalid base64 payload").into())
}

/// Decode a MIDI file given as a data URI, failing on the first parse error.
pub fn try_decode_data_uri(uri: &str) -> ParseResult<Decoded> {
    try_decode(&data_uri_payload(uri)?)
}

/// Decode a MIDI file given as a data URI into its notes, sorted by start time.
///
/// Like [`decode`](fn.decode.html), this never fails and yields no notes on error.
pub fn decode_data_uri(uri: &str) -> Vec<DecodedNote> {
    match try_decode_data_uri(uri) {
        Ok(decoded) => decoded.notes,
        Err(err) => {
            warn!("failed to decode midi data uri: {}", err.chain());
            Vec::new()
        }
    }
}
