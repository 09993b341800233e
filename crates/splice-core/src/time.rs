//! Frame-accurate time primitives.
//!
//! All timeline positions are integer frame counts at the timeline's fixed
//! rate, so edit arithmetic never accumulates rounding error. Rates are kept
//! as numerator/denominator pairs for timecode conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpliceError};

/// A frame count (or a signed frame delta).
pub type Frame = i64;

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Nominal integer rate used for timecode labels (30 for 29.97).
    #[inline]
    pub fn timecode_base(self) -> i64 {
        self.to_fps_f64().round().max(1.0) as i64
    }

    /// Whether this rate uses SMPTE drop-frame timecode.
    pub fn is_drop_frame(self) -> bool {
        self.denominator == 1001 && matches!(self.timecode_base(), 30 | 60)
    }

    /// Seconds covered by `frames` frames.
    #[inline]
    pub fn frames_to_seconds(self, frames: Frame) -> f64 {
        frames as f64 * self.denominator as f64 / self.numerator as f64
    }

    /// Frame index containing the given time in seconds.
    #[inline]
    pub fn seconds_to_frames(self, seconds: f64) -> Frame {
        (seconds * self.to_fps_f64()).floor() as Frame
    }

    /// Format a frame count as `HH:MM:SS:FF` (`HH:MM:SS;FF` for drop-frame rates).
    pub fn to_timecode(self, frames: Frame) -> String {
        let base = self.timecode_base();
        let mut frames = frames.max(0);
        let separator = if self.is_drop_frame() {
            let drop = base / 15;
            let per_ten_minutes = base * 600 - drop * 9;
            let per_minute = base * 60 - drop;
            let tens = frames / per_ten_minutes;
            let rem = frames % per_ten_minutes;
            frames += drop * 9 * tens;
            if rem > drop {
                frames += drop * ((rem - drop) / per_minute);
            }
            ';'
        } else {
            ':'
        };

        let ff = frames % base;
        let total_seconds = frames / base;
        let ss = total_seconds % 60;
        let mm = (total_seconds / 60) % 60;
        let hh = total_seconds / 3600;
        format!("{hh:02}:{mm:02}:{ss:02}{separator}{ff:02}")
    }

    /// Parse a timecode string (or a bare frame count) into frames.
    pub fn parse_timecode(self, text: &str) -> Result<Frame> {
        let text = text.trim();
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            return text
                .parse::<Frame>()
                .map_err(|e| SpliceError::InvalidRange(format!("Bad frame count '{text}': {e}")));
        }

        let parts: Vec<&str> = text.split([':', ';']).collect();
        if parts.len() != 4 {
            return Err(SpliceError::InvalidRange(format!(
                "Timecode '{text}' must look like HH:MM:SS:FF"
            )));
        }
        let mut fields = [0i64; 4];
        for (field, part) in fields.iter_mut().zip(&parts) {
            *field = part.parse::<i64>().map_err(|e| {
                SpliceError::InvalidRange(format!("Bad timecode field '{part}': {e}"))
            })?;
        }
        let [hh, mm, ss, ff] = fields;
        let base = self.timecode_base();
        if hh < 0 || !(0..60).contains(&mm) || !(0..60).contains(&ss) || !(0..base).contains(&ff) {
            return Err(SpliceError::InvalidRange(format!(
                "Timecode '{text}' is out of range at {self}"
            )));
        }

        let mut frames = ((hh * 3600 + mm * 60 + ss) * base) + ff;
        if text.contains(';') && self.is_drop_frame() {
            let drop = base / 15;
            let total_minutes = hh * 60 + mm;
            frames -= drop * (total_minutes - total_minutes / 10);
        }
        Ok(frames)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A frame range with inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// First frame (inclusive)
    pub start: Frame,
    /// Number of frames
    pub length: Frame,
}

impl TimeRange {
    /// Create a new range from start and length.
    #[inline]
    pub const fn new(start: Frame, length: Frame) -> Self {
        Self { start, length }
    }

    /// Create a range, rejecting negative starts and lengths.
    pub fn checked(start: Frame, length: Frame) -> Result<Self> {
        if start < 0 || length < 0 {
            return Err(SpliceError::InvalidRange(format!(
                "[{start}, +{length}) has a negative bound"
            )));
        }
        Ok(Self { start, length })
    }

    /// Create a range from start and end frames.
    #[inline]
    pub const fn from_start_end(start: Frame, end: Frame) -> Self {
        Self {
            start,
            length: end - start,
        }
    }

    /// End frame (exclusive).
    #[inline]
    pub const fn end(self) -> Frame {
        self.start + self.length
    }

    /// Whether the range covers no frames.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.length <= 0
    }

    /// Check if a frame is within this range.
    #[inline]
    pub fn contains(self, frame: Frame) -> bool {
        frame >= self.start && frame < self.end()
    }

    /// Check if `other` lies entirely inside this range.
    #[inline]
    pub fn contains_range(self, other: Self) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Check if two ranges share at least one frame. Touching ranges do not.
    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Check if one range ends exactly where the other begins.
    #[inline]
    pub fn adjacent(self, other: Self) -> bool {
        self.end() == other.start || other.end() == self.start
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self::from_start_end(
            self.start.max(other.start),
            self.end().min(other.end()),
        ))
    }

    /// Smallest range covering both.
    pub fn union(self, other: Self) -> Self {
        Self::from_start_end(self.start.min(other.start), self.end().max(other.end()))
    }

    /// The same range moved by `delta` frames.
    #[inline]
    pub const fn shifted(self, delta: Frame) -> Self {
        Self {
            start: self.start + delta,
            length: self.length,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
