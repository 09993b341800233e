//! Transitions between adjacent clips.

use serde::{Deserialize, Serialize};
use splice_core::{Frame, TimeRange};
use uuid::Uuid;

use crate::clip::ItemId;
use crate::filter::{FilterAttachment, Parameter};

/// A blended overlap region between two clips on the same track.
///
/// The clips on either side are not stored; they are whatever clip ends at
/// `start` and whatever clip begins at `start + length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: ItemId,
    pub start: Frame,
    pub length: Frame,
    /// Frames taken from the left clip; the original cut sits at `start + head`.
    pub head: Frame,
    /// Transition type identifier (e.g. "dissolve", "wipe").
    pub type_id: String,
    pub parameters: Vec<Parameter>,
    pub filters: Vec<FilterAttachment>,
}

impl Transition {
    /// A dissolve-style transition covering `range`, cut at `start + head`.
    pub fn new(type_id: impl Into<String>, range: TimeRange, head: Frame) -> Self {
        Self::with_id(Uuid::new_v4(), type_id, range, head)
    }

    pub fn with_id(id: ItemId, type_id: impl Into<String>, range: TimeRange, head: Frame) -> Self {
        Self {
            id,
            start: range.start,
            length: range.length,
            head,
            type_id: type_id.into(),
            parameters: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.length)
    }

    pub fn end(&self) -> Frame {
        self.start + self.length
    }

    /// Position of the cut the transition replaced.
    pub fn cut(&self) -> Frame {
        self.start + self.head
    }
}
