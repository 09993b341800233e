//! Clip types for the timeline.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use splice_core::limits::MIN_CLIP_LENGTH;
use splice_core::{Frame, Result, SpliceError, TimeRange};
use uuid::Uuid;

use crate::filter::FilterAttachment;

/// Stable identifier of a track.
pub type TrackId = Uuid;
/// Stable identifier of a clip or transition.
pub type ItemId = Uuid;
/// Key into the external media-source registry.
pub type SourceId = String;

/// Reference to a media source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: SourceId,
    /// Frames available in the source.
    pub duration: Frame,
}

impl SourceRef {
    /// Create a new source reference.
    pub fn new(id: impl Into<SourceId>, duration: Frame) -> Self {
        Self {
            id: id.into(),
            duration,
        }
    }
}

/// Which end of a clip a fade applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FadeEdge {
    In,
    Out,
}

/// A clip on the timeline.
///
/// `source_in..source_out` is the used source window. The timeline length is
/// derived from that window and the speed, so it is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique clip ID
    pub id: ItemId,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Reference to source media
    pub source: SourceRef,
    /// Source in point
    pub source_in: Frame,
    /// Source out point (exclusive)
    pub source_out: Frame,
    /// Timeline position of the first frame
    pub start: Frame,
    /// Playback speed; negative plays the source window backwards
    pub speed: Rational64,
    pub fade_in: Frame,
    pub fade_out: Frame,
    pub filters: Vec<FilterAttachment>,
}

impl Clip {
    /// Create a clip using the whole source at normal speed.
    pub fn new(name: impl Into<String>, source: SourceRef) -> Self {
        let source_out = source.duration;
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            source_in: 0,
            source_out,
            start: 0,
            speed: Rational64::from_integer(1),
            fade_in: 0,
            fade_out: 0,
            filters: Vec::new(),
        }
    }

    /// Create a clip over part of a source.
    pub fn with_range(
        name: impl Into<String>,
        source: SourceRef,
        source_in: Frame,
        source_out: Frame,
    ) -> Result<Self> {
        let mut clip = Self::new(name, source);
        clip.source_in = source_in;
        clip.source_out = source_out;
        clip.validate()?;
        Ok(clip)
    }

    /// Timeline length: `(source_out - source_in) / |speed|`, rounded down.
    pub fn length(&self) -> Frame {
        frames_for_span(self.source_out - self.source_in, self.speed)
    }

    /// Timeline range occupied by the clip.
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.length())
    }

    /// Timeline end frame (exclusive).
    pub fn end(&self) -> Frame {
        self.start + self.length()
    }

    /// Whether the source window plays forwards.
    pub fn plays_forward(&self) -> bool {
        (*self.speed.numer() > 0) == (*self.speed.denom() > 0)
    }

    /// Source frames consumed by `frames` timeline frames.
    fn span_for_frames(&self, frames: Frame) -> Frame {
        (Rational64::from_integer(frames) * abs(self.speed))
            .floor()
            .to_integer()
    }

    /// Timeline frames the head can grow by before running out of source.
    pub fn head_headroom(&self) -> Frame {
        let spare = if self.plays_forward() {
            self.source_in
        } else {
            self.source.duration - self.source_out
        };
        frames_for_span(spare, self.speed)
    }

    /// Timeline frames the tail can grow by before running out of source.
    pub fn tail_headroom(&self) -> Frame {
        let spare = if self.plays_forward() {
            self.source.duration - self.source_out
        } else {
            self.source_in
        };
        frames_for_span(spare, self.speed)
    }

    /// Resize keeping the end fixed. Keys stay anchored to the source.
    ///
    /// Trimming the head in can leave keys before offset 0. They are kept and
    /// come back into range when the head is extended again.
    pub fn resize_head(&mut self, new_length: Frame) -> Result<()> {
        let old_length = self.length();
        let end = self.end();
        let span = self.span_for_frames(new_length);
        let (source_in, source_out) = if self.plays_forward() {
            (self.source_out - span, self.source_out)
        } else {
            (self.source_in, self.source_in + span)
        };
        self.check_window(source_in, source_out)?;

        self.source_in = source_in;
        self.source_out = source_out;
        let length = self.length();
        self.start = end - length;
        for filter in &mut self.filters {
            filter.shift_keys(length - old_length);
        }
        self.clamp_fades();
        Ok(())
    }

    /// Resize keeping the start fixed.
    pub fn resize_tail(&mut self, new_length: Frame) -> Result<()> {
        let span = self.span_for_frames(new_length);
        let (source_in, source_out) = if self.plays_forward() {
            (self.source_in, self.source_in + span)
        } else {
            (self.source_out - span, self.source_out)
        };
        self.check_window(source_in, source_out)?;

        self.source_in = source_in;
        self.source_out = source_out;
        self.clamp_fades();
        Ok(())
    }

    fn check_window(&self, source_in: Frame, source_out: Frame) -> Result<()> {
        if source_in < 0 || source_out > self.source.duration {
            return Err(SpliceError::InsufficientTrim(format!(
                "'{}' needs source [{source_in}, {source_out}) but only {} frames exist",
                self.name, self.source.duration
            )));
        }
        if frames_for_span(source_out - source_in, self.speed) < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' would be shorter than {MIN_CLIP_LENGTH} frame",
                self.name
            )));
        }
        Ok(())
    }

    /// Split at `offset` frames from the start. `self` keeps the left half.
    ///
    /// The right half gets `right_id`. Filters are duplicated and each half's
    /// curves are cut at the split point.
    pub fn split_off(&mut self, offset: Frame, right_id: ItemId) -> Result<Clip> {
        let length = self.length();
        if offset <= 0 || offset >= length {
            return Err(SpliceError::InvalidRange(format!(
                "split offset {offset} is not inside '{}' (length {length})",
                self.name
            )));
        }
        let span = (Rational64::from_integer(offset) * abs(self.speed))
            .ceil()
            .to_integer();
        if frames_for_span(span, self.speed) != offset {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' has no source frame boundary at {offset} at speed {}",
                self.name, self.speed
            )));
        }
        let left_length = offset;
        let right_length =
            frames_for_span(self.source_out - self.source_in - span, self.speed);
        if right_length < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!(
                "split of '{}' at {offset} leaves an empty half",
                self.name
            )));
        }

        let mut right = self.clone();
        right.id = right_id;
        if self.plays_forward() {
            self.source_out = self.source_in + span;
            right.source_in = self.source_out;
        } else {
            self.source_in = self.source_out - span;
            right.source_out = self.source_in;
        }
        right.start = self.start + left_length;

        self.fade_out = 0;
        right.fade_in = 0;
        let (left_filters, right_filters): (Vec<_>, Vec<_>) = self
            .filters
            .iter()
            .map(|f| f.split_at(left_length))
            .unzip();
        self.filters = left_filters;
        right.filters = right_filters;
        self.clamp_fades();
        right.clamp_fades();
        Ok(right)
    }

    /// Whether `next` picks up exactly where this clip stops in the same source.
    pub fn continues_into(&self, next: &Clip) -> bool {
        let same_window = if self.plays_forward() {
            self.source_out == next.source_in
        } else {
            self.source_in == next.source_out
        };
        same_window
            && self.source == next.source
            && self.speed == next.speed
            && self.filters.len() == next.filters.len()
            && self
                .filters
                .iter()
                .zip(&next.filters)
                .all(|(a, b)| a.same_setup(b))
            && self.fade_out == 0
            && next.fade_in == 0
            && self.end() == next.start
    }

    /// Absorb `next` into this clip. Caller checks [`Clip::continues_into`].
    ///
    /// Curves are joined back together and the keys a split added at the
    /// seam are dropped.
    pub(crate) fn absorb(&mut self, next: Clip) {
        let seam = self.length();
        for (filter, other) in self.filters.iter_mut().zip(&next.filters) {
            filter.join(other, seam);
        }
        if self.plays_forward() {
            self.source_out = next.source_out;
        } else {
            self.source_in = next.source_in;
        }
        self.fade_out = next.fade_out;
    }

    /// Change speed keeping the source window.
    pub fn set_speed(&mut self, speed: Rational64) -> Result<()> {
        if *speed.numer() == 0 || *speed.denom() == 0 {
            return Err(SpliceError::InvalidRange(format!(
                "speed {speed} is not allowed"
            )));
        }
        if frames_for_span(self.source_out - self.source_in, speed) < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' would be shorter than {MIN_CLIP_LENGTH} frame at speed {speed}",
                self.name
            )));
        }
        self.speed = speed;
        self.clamp_fades();
        Ok(())
    }

    /// Set a fade length.
    pub fn set_fade(&mut self, edge: FadeEdge, length: Frame) -> Result<()> {
        if length < 0 || length > self.length() {
            return Err(SpliceError::InvalidRange(format!(
                "fade of {length} frames does not fit '{}' (length {})",
                self.name,
                self.length()
            )));
        }
        match edge {
            FadeEdge::In => self.fade_in = length,
            FadeEdge::Out => self.fade_out = length,
        }
        Ok(())
    }

    fn clamp_fades(&mut self) {
        let length = self.length();
        self.fade_in = self.fade_in.clamp(0, length);
        self.fade_out = self.fade_out.clamp(0, length);
    }

    /// Check the clip's own invariants.
    pub fn validate(&self) -> Result<()> {
        if *self.speed.numer() == 0 || *self.speed.denom() == 0 {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' has zero speed",
                self.name
            )));
        }
        if self.start < 0 {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' starts at negative frame {}",
                self.name, self.start
            )));
        }
        if self.source_in < 0
            || self.source_in > self.source_out
            || self.source_out > self.source.duration
        {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' source window [{}, {}) is outside 0..{}",
                self.name, self.source_in, self.source_out, self.source.duration
            )));
        }
        let length = self.length();
        if length < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!("'{}' is empty", self.name)));
        }
        if self.fade_in < 0 || self.fade_out < 0 || self.fade_in > length || self.fade_out > length
        {
            return Err(SpliceError::InvalidRange(format!(
                "'{}' fades exceed its length {length}",
                self.name
            )));
        }
        Ok(())
    }
}

fn abs(speed: Rational64) -> Rational64 {
    Rational64::new(speed.numer().abs(), speed.denom().abs())
}

/// Timeline frames produced by `span` source frames at `speed`.
fn frames_for_span(span: Frame, speed: Rational64) -> Frame {
    if *speed.numer() == 0 || *speed.denom() == 0 {
        return 0;
    }
    (Rational64::from_integer(span) / abs(speed))
        .floor()
        .to_integer()
}
