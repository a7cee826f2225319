//! # Overview
//!
//! `midigen` turns generated note lines into Standard Midi Files (SMF) and back.
//!
//! The encoding side takes the free-form text produced by a note generator, validates it into a
//! typed [`Score`](enum.Score.html) and writes it as a complete SMF byte stream:
//!
//! ```rust
//! let text = r#"[["C", 4, 500], ["E", 4, 500], ["G", 4, 1000]]"#;
//! let score = midigen::validate(text).unwrap();
//! let bytes = midigen::encode_score(&score, &midigen::EncoderConfig::default()).unwrap();
//! assert_eq!(&bytes[..4], b"MThd");
//! ```
//!
//! The result can also be exposed as an embeddable data URI with
//! [`to_data_uri`](fn.to_data_uri.html).
//!
//! The decoding side reads any SMF byte stream back into a time-ordered list of notes, measured
//! in beats:
//!
//! ```rust
//! # let text = r#"[["C", 4, 500], ["E", 4, 500], ["G", 4, 1000]]"#;
//! # let score = midigen::validate(text).unwrap();
//! # let bytes = midigen::encode_score(&score, &midigen::EncoderConfig::default()).unwrap();
//! let notes = midigen::decode(&bytes);
//! assert_eq!(notes.len(), 3);
//! assert_eq!(notes[2].start, 2.0);
//! assert_eq!(notes[2].duration, 2.0);
//! ```
//!
//! # About error handling
//!
//! Validation and encoding fail hard: the first problem found is returned as an
//! [`Error`](enum.Error.html) pointing at the offending line and element.
//!
//! Decoding through [`decode`](fn.decode.html) never fails. A file that cannot be read is logged
//! through the `log` facade and yields no notes at all, so that arbitrary input bytes cannot
//! take down the caller. Use [`try_decode`](fn.try_decode.html) to get at the
//! [`ParseError`](struct.ParseError.html) itself.
//!
//! # About features
//!
//! - The `parallel` feature
//!
//!   Encodes and decodes tracks on the `rayon` thread pool. Enabled by default.
//!   Multithreading is automatically skipped for tiny inputs.
//!
//! - The `strict` feature
//!
//!   By default the reader accepts files that are readable even though they bend the SMF rules,
//!   such as files declaring a different amount of tracks than they contain.
//!   By enabling the `strict` feature these files are rejected with errors of the kind
//!   `ParseErrorKind::Malformed`.

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, ParseError, ParseErrorKind, ParseResult, Result, ResultExt, StdResult},
        primitive::{u15, u24, u28, u4, u7, IntRead, SplitChecked},
    };
    pub(crate) use core::{convert::TryFrom, fmt, mem, ops};
    pub(crate) use log::{debug, trace, warn};

    pub(crate) fn bit_range<T>(val: T, range: ops::Range<u32>) -> T
    where
        T: From<u8>
            + ops::Shr<u32, Output = T>
            + ops::Shl<u32, Output = T>
            + ops::Not<Output = T>
            + ops::BitAnd<Output = T>,
    {
        let mask = !((!T::from(0)) << (range.end - range.start));
        (val >> range.start) & mask
    }
}

mod config;
mod pitch;
mod primitive;
mod reader;
mod riff;
mod score;
mod timebase;
mod validate;
mod writer;

pub use crate::{
    config::{EncoderConfig, LineConfig},
    error::{Error, ParseError, ParseErrorKind, ParseResult, Result},
    pitch::{decode_pitch, pitch_number, PitchClass},
    primitive::Format,
    reader::{
        decode, decode_data_uri, try_decode, try_decode_data_uri, Decoded, DecodedNote, TempoChange,
    },
    score::{LineRole, NoteEvent, Score, StructuredScore, Track},
    timebase::{TimeBase, DEFAULT_DIVISION, REFERENCE_BPM},
    validate::{extract_json, validate},
    writer::{encode, encode_score, to_data_uri, write, MIDI_DATA_URI_PREFIX},
};

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u15, u24, u28, u4, u7};
}

/// MIDI variable-length quantities, used for delta-times and meta/sysex lengths.
pub mod vlq {
    pub use crate::primitive::{decode_varlen as decode, encode_varlen as encode};
}
