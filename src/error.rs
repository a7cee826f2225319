use crate::score::LineRole;
use core::fmt;
use thiserror::Error;

/// Any error produced while validating, encoding or decoding a score.
///
/// Validation and encoding fail hard with the first error found, carrying enough location info
/// (line role, element index, track) to point at the offending input.
/// Decoding failures are reported as [`Error::Parse`], although the fail-soft
/// [`decode`](fn.decode.html) entry point only logs them.
#[derive(Debug, Error)]
pub enum Error {
    /// The input text is not JSON, or not of the expected array/object shape.
    #[error("format error{}: {message}", Location(.line, .index))]
    Format {
        line: Option<LineRole>,
        index: Option<usize>,
        message: String,
    },
    /// A pitch class, octave, duration or velocity is outside its allowed domain.
    #[error("range error{}: {message}", Location(.line, .index))]
    Range {
        line: Option<LineRole>,
        index: Option<usize>,
        message: String,
    },
    /// A note that passed validation still cannot be represented in a MIDI file.
    #[error("encoding error in track {track}, note {index}: {message}")]
    Encoding {
        track: usize,
        index: usize,
        message: String,
    },
    /// The binary stream is not a readable Standard Midi File.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The output writer failed.
    #[error("failed to write midi data: {0}")]
    Io(#[from] std::io::Error),
}
impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Error {
        Error::Format {
            line: None,
            index: None,
            message: message.into(),
        }
    }

    pub(crate) fn range(message: impl Into<String>) -> Error {
        Error::Range {
            line: None,
            index: None,
            message: message.into(),
        }
    }

    /// Attach the position of the offending element to a format or range error.
    pub(crate) fn at(self, at_line: Option<LineRole>, at_index: usize) -> Error {
        match self {
            Error::Format { message, .. } => Error::Format {
                line: at_line,
                index: Some(at_index),
                message,
            },
            Error::Range { message, .. } => Error::Range {
                line: at_line,
                index: Some(at_index),
                message,
            },
            other => other,
        }
    }

    /// The index of the offending element, if this error points at one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Error::Format { index, .. } | Error::Range { index, .. } => *index,
            Error::Encoding { index, .. } => Some(*index),
            Error::Parse(_) | Error::Io(_) => None,
        }
    }
}

struct Location<'a>(&'a Option<LineRole>, &'a Option<usize>);
impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (*self.0, *self.1) {
            (Some(line), Some(idx)) => write!(f, " in {} at index {}", line, idx),
            (Some(line), None) => write!(f, " in {}", line),
            (None, Some(idx)) => write!(f, " at index {}", idx),
            (None, None) => Ok(()),
        }
    }
}

/// The type of error that occurred while parsing.
///
/// As a library consumer, detailed errors about what specific part of the MIDI spec was
/// violated are not very useful.
/// For this reason, errors are broadly categorized into 2 classes, and specific error info is
/// provided as a non-normative string literal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// Fatal errors while reading the file. It is likely that the file is not a MIDI file or
    /// is severely corrupted.
    ///
    /// No notes can be rescued from the file.
    #[error("invalid midi: {0}")]
    Invalid(&'static str),

    /// Non-fatal error, but the file is clearly not compliant.
    ///
    /// This kind of error is not emitted by default, only if the `strict` crate feature is
    /// enabled.
    #[error("malformed midi: {0}")]
    Malformed(&'static str),
}
impl ParseErrorKind {
    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            ParseErrorKind::Invalid(msg) => msg,
            ParseErrorKind::Malformed(msg) => msg,
        }
    }
}

/// Represents an error while parsing an SMF file.
///
/// Wraps a `ParseErrorKind` along with the lower-level error that caused it, if any.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ParseError {
    kind: ParseErrorKind,
    source: Option<Box<ParseError>>,
}
impl ParseError {
    /// Create a new error with the given `ParseErrorKind`.
    #[inline]
    pub fn new(kind: ParseErrorKind) -> ParseError {
        ParseError { kind, source: None }
    }

    /// More information about the error itself.
    #[inline]
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// The underlying cause for this error.
    #[inline]
    pub fn cause(&self) -> Option<&ParseError> {
        self.source.as_deref()
    }

    /// The innermost error in the chain, which is usually the most specific one.
    pub fn root(&self) -> &ParseError {
        let mut err = self;
        while let Some(src) = err.cause() {
            err = src;
        }
        err
    }

    /// Render the error along with its whole cause chain.
    pub fn chain(&self) -> String {
        let mut out = self.kind.to_string();
        let mut maybe_src = self.cause();
        while let Some(src) = maybe_src {
            out.push_str("\n  caused by: ");
            out.push_str(&src.kind.to_string());
            maybe_src = src.cause();
        }
        out
    }

    fn chain_ctx(self, ctx: ParseErrorKind) -> ParseError {
        ParseError {
            kind: ctx,
            source: Some(Box::new(self)),
        }
    }
}
impl From<ParseErrorKind> for ParseError {
    #[inline]
    fn from(kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind)
    }
}

macro_rules! err_invalid {
    ($msg:expr) => {{
        $crate::error::ParseErrorKind::Invalid($msg)
    }};
}
macro_rules! err_malformed {
    ($msg:expr) => {{
        $crate::error::ParseErrorKind::Malformed($msg)
    }};
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: ParseErrorKind) -> StdResult<T, ParseError>;
}
impl<T> ResultExt<T> for StdResult<T, ParseError> {
    #[inline]
    fn context(self, ctx: ParseErrorKind) -> StdResult<T, ParseError> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}
impl<T> ResultExt<T> for StdResult<T, ParseErrorKind> {
    #[inline]
    fn context(self, ctx: ParseErrorKind) -> StdResult<T, ParseError> {
        self.map_err(|errkind| ParseError::from(errkind).chain_ctx(ctx))
    }
}

/// The result type used throughout the crate.
pub type Result<T> = StdResult<T, Error>;
/// The result type used by the MIDI parser.
pub type ParseResult<T> = StdResult<T, ParseError>;
pub(crate) use core::result::Result as StdResult;
