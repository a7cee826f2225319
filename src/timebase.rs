//! Conversions between milliseconds, ticks and beats.

use crate::prelude::*;

/// Ticks per beat (quarter note) used when writing files.
pub const DEFAULT_DIVISION: u16 = 480;

/// The reference tempo that note durations in milliseconds are measured against.
pub const REFERENCE_BPM: u32 = 120;

/// A metrical timebase: a division in ticks per beat and a fixed tempo.
///
/// At the reference tempo of 120 BPM a beat lasts 500ms, so with the default division of 480
/// one tick is a little over a millisecond. Converting milliseconds to ticks rounds to the
/// nearest tick, so a round trip is off by at most `ms_per_beat / division` milliseconds.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TimeBase {
    division: u15,
    bpm: u32,
}
impl TimeBase {
    /// Create a timebase with the given division (ticks per beat) and tempo.
    ///
    /// Panics if either is zero.
    pub fn new(division: u15, bpm: u32) -> TimeBase {
        assert!(division.as_int() > 0, "division must be positive");
        assert!(bpm > 0, "tempo must be positive");
        TimeBase { division, bpm }
    }

    /// A timebase at the reference tempo with the given division.
    pub fn with_division(division: u15) -> TimeBase {
        TimeBase::new(division, REFERENCE_BPM)
    }

    #[inline]
    pub fn division(&self) -> u15 {
        self.division
    }

    #[inline]
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// How long a beat lasts at this tempo.
    #[inline]
    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.bpm as f64
    }

    /// The tempo as it is stored in a tempo meta-event.
    pub fn micros_per_beat(&self) -> u24 {
        u24::new(60_000_000 / self.bpm)
    }

    /// Convert a duration in milliseconds to the nearest whole amount of ticks.
    ///
    /// Panics if `ms` is negative or not finite.
    pub fn ms_to_ticks(&self, ms: f64) -> u64 {
        assert!(
            ms.is_finite() && ms >= 0.0,
            "milliseconds must be finite and non-negative, got {}",
            ms
        );
        (ms * self.division.as_int() as f64 / self.ms_per_beat()).round() as u64
    }

    pub fn ticks_to_ms(&self, ticks: u64) -> f64 {
        ticks as f64 * self.ms_per_beat() / self.division.as_int() as f64
    }

    pub fn ticks_to_beats(&self, ticks: u64) -> f64 {
        ticks as f64 / self.division.as_int() as f64
    }

    /// Convert beats to the nearest whole amount of ticks.
    ///
    /// Panics if `beats` is negative or not finite.
    pub fn beats_to_ticks(&self, beats: f64) -> u64 {
        assert!(
            beats.is_finite() && beats >= 0.0,
            "beats must be finite and non-negative, got {}",
            beats
        );
        (beats * self.division.as_int() as f64).round() as u64
    }
}
impl Default for TimeBase {
    fn default() -> TimeBase {
        TimeBase::with_division(u15::new(DEFAULT_DIVISION))
    }
}
