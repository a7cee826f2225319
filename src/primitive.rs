//! Simple building-block data that can be read in one go.
//! Also, primitives advance the read pointer when read.

use crate::prelude::*;

pub(crate) trait SplitChecked: Sized {
    fn split_checked(&mut self, at: usize) -> Option<Self>;
}
impl<'a> SplitChecked for &'a [u8] {
    #[inline]
    fn split_checked(&mut self, at: usize) -> Option<&'a [u8]> {
        if at > self.len() {
            None
        } else {
            let (extracted, remainder) = self.split_at(at);
            *self = remainder;
            Some(extracted)
        }
    }
}

/// Implemented on integer types for reading as big-endian.
pub(crate) trait IntRead: Sized {
    /// Reads a big-endian integer.
    fn read(data: &mut &[u8]) -> StdResult<Self, ParseErrorKind>;
}

/// Implement simple big endian integer reads.
macro_rules! impl_read_int {
    {$( $int:ty ),*} => {
        $(
            impl IntRead for $int {
                #[inline]
                fn read(raw: &mut &[u8]) -> StdResult<$int, ParseErrorKind> {
                    let bytes = raw.split_checked(mem::size_of::<$int>())
                        .ok_or(err_invalid!("failed to read the expected integer"))?;
                    //`checked_shl` keeps the single-byte instance from overflowing
                    Ok(bytes.iter().fold(0, |acc: $int, byte| {
                        acc.checked_shl(8).unwrap_or(0) | *byte as $int
                    }))
                }
            }
        )*
    }
}
impl_read_int! {u8,u16,u32}

macro_rules! restricted_int {
    {$(#[$attr:meta])* $name:ident : $inner:tt => $bits:expr} => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl From<$inner> for $name {
            /// Lossy conversion, loses the top bits.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::new(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(restricted: $name) -> $inner {restricted.0}
        }
        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// The maximum value that this restricted integer can hold.
            #[inline]
            pub const fn max_value() -> $name {
                $name(Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart by masking off the
            /// extra bits.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name(raw & Self::MASK)
            }

            /// Returns `Some` if the raw integer is within range of the restricted integer, and
            /// `None` otherwise.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw <= Self::MASK {
                    Some($name(raw))
                } else {
                    None
                }
            }

            /// Get the inner integer out of the wrapper.
            /// The inner integer is guaranteed to be in range of the restricted wrapper.
            #[inline]
            pub fn as_int(self) -> $inner {
                self.0
            }

            #[inline]
            pub(crate) fn check_int(raw: $inner) -> StdResult<$name, ParseErrorKind> {
                Self::try_from(raw).ok_or_else(
                    || err_invalid!("invalid integer with top bits set")
                )
            }
        }
        impl PartialEq<$inner> for $name {
            fn eq(&self, rhs: &$inner) -> bool {
                self.as_int() == *rhs
            }
        }
        impl PartialOrd<$inner> for $name {
            fn partial_cmp(&self, rhs: &$inner) -> Option<core::cmp::Ordering> {
                Some(self.as_int().cmp(rhs))
            }
        }
    };
}
restricted_int! {
    /// A 4-bit integer type, used for MIDI channels.
    ///
    /// Wraps the `u8` type and ensures that the top 4 bits are always zero.
    u4: u8 => 4
}
restricted_int! {
    /// A 7-bit integer type, used for keys, velocities and programs.
    ///
    /// Wraps the `u8` type and ensures that the top bit is always zero.
    u7: u8 => 7
}
restricted_int! {
    /// A 15-bit integer type, used for the metrical division of a file.
    ///
    /// Wraps the `u16` type and ensures that the top bit is always zero.
    u15: u16 => 15
}
restricted_int! {
    /// A 24-bit integer type, used for tempo in microseconds per beat.
    ///
    /// Wraps the `u32` type and ensures that the top 8 bits are always zero.
    u24: u32 => 24
}
restricted_int! {
    /// Referred to in the MIDI spec as "variable length int".
    ///
    /// Delta-times and meta/sysex lengths are encoded as these, at most 4 bytes long.
    u28: u32 => 28
}

impl u24 {
    pub(crate) fn read(raw: &mut &[u8]) -> StdResult<u24, ParseErrorKind> {
        let bytes = raw
            .split_checked(3)
            .ok_or(err_invalid!("failed to read u24 bytes"))?;
        //Using lossy `from` because value is guaranteed to be 24 bits (3 bytes)
        Ok(u24::from(
            bytes.iter().fold(0, |acc, byte| acc << 8 | *byte as u32),
        ))
    }
}

impl u28 {
    /// Read a variable-length quantity, advancing the slice past it.
    ///
    /// Each byte contributes its bottom 7 bits, most significant group first. A byte with the top
    /// bit clear terminates the quantity.
    ///
    /// Fails if the slice ends before the terminator, or if the quantity is longer than 4 bytes
    /// (which would not fit in 28 bits).
    pub fn read_varlen(raw: &mut &[u8]) -> StdResult<u28, ParseErrorKind> {
        let mut int: u32 = 0;
        for _ in 0..4 {
            let byte = match raw.split_checked(1) {
                Some(slice) => slice[0],
                None => bail!(err_invalid!("truncated varlen integer")),
            };
            int <<= 7;
            int |= bit_range(byte, 0..7) as u32;
            if bit_range(byte, 7..8) == 0 {
                //At most 4 reads of 7 bits each were done, so the int fits in 28 bits
                return Ok(u28::from(int));
            }
        }
        Err(err_invalid!("varlen integer larger than 4 bytes"))
    }

    /// Encode as a variable-length quantity.
    ///
    /// Returns a buffer along with how many of its leading bytes are used (between 1 and 4).
    pub fn encode_varlen(self) -> ([u8; 4], usize) {
        let int = self.as_int();
        let mut buf = [0; 4];
        let mut len = 0;
        let mut skipping = true;
        for i in (0..4).rev() {
            let byte = ((int >> (i * 7)) & 0x7F) as u8;
            if skipping && byte == 0 && i != 0 {
                //Skip these leading zeros
            } else {
                skipping = false;
                //Every group except the last one carries the continuation flag
                buf[len] = if i == 0 { byte } else { byte | 0x80 };
                len += 1;
            }
        }
        (buf, len)
    }

    /// How many bytes the variable-length encoding of this integer takes.
    pub fn varlen_len(self) -> usize {
        self.encode_varlen().1
    }

    pub(crate) fn write_varlen(self, out: &mut Vec<u8>) {
        let (buf, len) = self.encode_varlen();
        out.extend_from_slice(&buf[..len]);
    }
}

/// Encode a value as a MIDI variable-length quantity.
pub fn encode_varlen(value: u28) -> Vec<u8> {
    let (buf, len) = value.encode_varlen();
    buf[..len].to_vec()
}

/// Decode a MIDI variable-length quantity from the start of `raw`, advancing it past the
/// quantity.
pub fn decode_varlen(raw: &mut &[u8]) -> ParseResult<u28> {
    Ok(u28::read_varlen(raw)?)
}

/// Reads a slice represented in the input as a `u28` `len` followed by `len` bytes.
pub(crate) fn read_varlen_slice<'a>(raw: &mut &'a [u8]) -> ParseResult<&'a [u8]> {
    let len = u28::read_varlen(raw)
        .context(err_invalid!("failed to read varlen slice length"))?
        .as_int();
    match raw.split_checked(len as usize) {
        Some(slice) => Ok(slice),
        None => bail!(err_invalid!("incomplete varlen slice")),
    }
}

/// Write a slice represented as a varlen `u28` as its length and then the raw bytes.
pub(crate) fn write_varlen_slice(slice: &[u8], out: &mut Vec<u8>) {
    //Only ever called with short, crate-built payloads
    u28::new(slice.len() as u32).write_varlen(out);
    out.extend_from_slice(slice);
}

/// The order in which tracks should be laid out when playing back this SMF file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Format {
    /// This file should have a single track only.
    ///
    /// If the `strict` feature is enabled, an error is raised if the format is
    /// `Format::SingleTrack` and there is not exactly one track.
    SingleTrack,
    /// This file has several tracks that should be played simultaneously.
    ///
    /// Usually the first track controls tempo and other song metadata.
    Parallel,
    /// This file has several tracks, each one a separate song.
    Sequential,
}
impl Format {
    /// The format used for a file with the given amount of tracks.
    pub fn for_track_count(track_count: usize) -> Format {
        if track_count > 1 {
            Format::Parallel
        } else {
            Format::SingleTrack
        }
    }

    pub(crate) fn read(raw: &mut &[u8]) -> ParseResult<Format> {
        let format = u16::read(raw)?;
        Ok(match format {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => bail!(err_invalid!("invalid smf format")),
        })
    }

    pub(crate) fn encode(&self) -> [u8; 2] {
        let code: u16 = match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        };
        code.to_be_bytes()
    }
}
