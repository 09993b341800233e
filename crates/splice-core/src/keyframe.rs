//! Keyframe animation curves.
//!
//! A [`KeyframeTrack`] holds discrete samples keyed by frame offset relative
//! to the owning clip or filter start. Evaluation is a pure function of the
//! track, so the render path can sample an immutable snapshot from any thread.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::{Frame, TimeRange};

/// How to fill the frames between two keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hold the preceding key's value until the next key.
    Discrete,
    /// Straight line between the bracketing keys.
    #[default]
    Linear,
    /// Cubic Hermite curve with Catmull-Rom tangents.
    Smooth,
}

/// A single (offset, value) sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Frame offset relative to the owner's start.
    pub offset: Frame,
    pub value: f64,
    /// Added at a cut by [`KeyframeTrack::slice`]; dropped again by
    /// [`KeyframeTrack::join`].
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub seam: bool,
}

impl Keyframe {
    pub const fn new(offset: Frame, value: f64) -> Self {
        Self {
            offset,
            value,
            seam: false,
        }
    }
}

/// An animation curve for one parameter.
///
/// Keys are kept sorted with strictly increasing offsets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyframeTrack {
    pub interpolation: Interpolation,
    keys: Vec<Keyframe>,
}

impl KeyframeTrack {
    /// Create an empty track.
    pub fn new(interpolation: Interpolation) -> Self {
        Self {
            interpolation,
            keys: Vec::new(),
        }
    }

    /// Build a track from unsorted samples. Later duplicates win.
    pub fn from_keys(
        interpolation: Interpolation,
        samples: impl IntoIterator<Item = (Frame, f64)>,
    ) -> Self {
        let mut track = Self::new(interpolation);
        for (offset, value) in samples {
            track.insert_or_update(offset, value);
        }
        track
    }

    /// Insert a key, or replace the value of an existing key at `offset`.
    ///
    /// Returns the previous value when a key was replaced.
    pub fn insert_or_update(&mut self, offset: Frame, value: f64) -> Option<f64> {
        match self.keys.binary_search_by(|k| k.offset.cmp(&offset)) {
            Ok(pos) => {
                self.keys[pos].seam = false;
                Some(std::mem::replace(&mut self.keys[pos].value, value))
            }
            Err(pos) => {
                self.keys.insert(pos, Keyframe::new(offset, value));
                None
            }
        }
    }

    /// Remove the key at `offset`, returning its value.
    pub fn remove(&mut self, offset: Frame) -> Option<f64> {
        let pos = self.keys.binary_search_by(|k| k.offset.cmp(&offset)).ok()?;
        Some(self.keys.remove(pos).value)
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Value of the key exactly at `offset`, if there is one.
    pub fn key_at(&self, offset: Frame) -> Option<f64> {
        self.keys
            .binary_search_by(|k| k.offset.cmp(&offset))
            .ok()
            .map(|pos| self.keys[pos].value)
    }

    /// Evaluate the curve at `offset`. `None` for an empty track.
    pub fn evaluate(&self, offset: Frame) -> Option<f64> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if offset <= first.offset {
            return Some(first.value);
        }
        if offset >= last.offset {
            return Some(last.value);
        }

        let idx = match self.keys.binary_search_by(|k| k.offset.cmp(&offset)) {
            Ok(pos) => return Some(self.keys[pos].value),
            Err(pos) => pos - 1,
        };
        let a = self.keys[idx];
        let b = self.keys[idx + 1];
        let t = (offset - a.offset) as f64 / (b.offset - a.offset) as f64;

        Some(match self.interpolation {
            Interpolation::Discrete => a.value,
            Interpolation::Linear => a.value + (b.value - a.value) * t,
            Interpolation::Smooth => {
                let before = idx.checked_sub(1).map(|i| self.keys[i]);
                let after = self.keys.get(idx + 2).copied();
                hermite(before, a, b, after, t)
            }
        })
    }

    /// The part of this curve that falls inside `range`, rebased to start at 0.
    ///
    /// Keys outside the range are dropped. When keys were dropped on a side, a
    /// seam key holding the curve's value at that edge is added so the
    /// animation stays in place.
    pub fn slice(&self, range: TimeRange) -> Self {
        let mut out = Self::new(self.interpolation);
        if range.is_empty() {
            return out;
        }
        let last_frame = range.end() - 1;
        out.keys = self
            .keys
            .iter()
            .filter(|k| range.contains(k.offset))
            .map(|k| Keyframe::new(k.offset - range.start, k.value))
            .collect();

        let dropped_before = self.keys.iter().any(|k| k.offset < range.start);
        let dropped_after = self.keys.iter().any(|k| k.offset > last_frame);
        if dropped_before && out.key_at(0).is_none() {
            if let Some(value) = self.evaluate(range.start) {
                out.insert_seam(0, value);
            }
        }
        if dropped_after && out.key_at(range.length - 1).is_none() {
            if let Some(value) = self.evaluate(last_frame) {
                out.insert_seam(range.length - 1, value);
            }
        }
        out
    }

    /// Cut the curve at `at`: keys before it stay, keys from it on move to a
    /// second curve rebased to 0.
    ///
    /// Keys outside the owner on the far sides are kept so a later trim back
    /// out finds them again. Each side that lost keys gets a seam key holding
    /// the curve's value at its edge of the cut.
    pub fn split_at(&self, at: Frame) -> (Self, Self) {
        let (before, after): (Vec<Keyframe>, Vec<Keyframe>) =
            self.keys.iter().copied().partition(|k| k.offset < at);
        let (lost_after, lost_before) = (!after.is_empty(), !before.is_empty());
        let mut left = Self {
            interpolation: self.interpolation,
            keys: before,
        };
        let mut right = Self {
            interpolation: self.interpolation,
            keys: after
                .into_iter()
                .map(|k| Keyframe {
                    offset: k.offset - at,
                    ..k
                })
                .collect(),
        };
        if lost_after && left.key_at(at - 1).is_none() {
            if let Some(value) = self.evaluate(at - 1) {
                left.insert_seam(at - 1, value);
            }
        }
        if lost_before && right.key_at(0).is_none() {
            if let Some(value) = self.evaluate(at) {
                right.insert_seam(0, value);
            }
        }
        (left, right)
    }

    fn insert_seam(&mut self, offset: Frame, value: f64) {
        let pos = self.keys.partition_point(|k| k.offset < offset);
        self.keys.insert(
            pos,
            Keyframe {
                seam: true,
                ..Keyframe::new(offset, value)
            },
        );
    }

    /// Rejoin two slices: `next` continues this curve `offset` frames later.
    ///
    /// Seam keys at the join (last frame of `self`, first frame of `next`)
    /// are dropped, so joining the two halves of a [`slice`](Self::slice)
    /// cut gives back the original keys.
    pub fn join(&self, next: &KeyframeTrack, offset: Frame) -> Self {
        let mut out = Self::new(self.interpolation);
        out.keys = self
            .keys
            .iter()
            .filter(|k| !(k.seam && k.offset == offset - 1))
            .copied()
            .collect();
        for key in next.keys.iter().filter(|k| !(k.seam && k.offset == 0)) {
            let shifted = Keyframe {
                offset: key.offset + offset,
                ..*key
            };
            if let Err(pos) = out.keys.binary_search_by(|k| k.offset.cmp(&shifted.offset)) {
                out.keys.insert(pos, shifted);
            }
        }
        out
    }

    /// Move every key by `delta` frames.
    pub fn shift(&mut self, delta: Frame) {
        for key in &mut self.keys {
            key.offset += delta;
        }
    }

    /// Get all keyframes (read-only).
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the track has no keyframes.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether offsets are strictly increasing (checked after deserialization).
    pub fn is_well_ordered(&self) -> bool {
        self.keys.windows(2).all(|w| w[0].offset < w[1].offset)
    }

    /// Frame span from first to last key.
    pub fn span(&self) -> Option<TimeRange> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        Some(TimeRange::from_start_end(first.offset, last.offset))
    }
}

impl fmt::Display for KeyframeTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyframeTrack({:?}, {} keyframes)",
            self.interpolation,
            self.keys.len()
        )
    }
}

/// Cubic Hermite blend between `a` and `b`.
///
/// A missing neighbour makes that end's tangent the segment's own slope, so a
/// segment with no neighbours at all reduces to a straight line.
fn hermite(before: Option<Keyframe>, a: Keyframe, b: Keyframe, after: Option<Keyframe>, t: f64) -> f64 {
    let span = (b.offset - a.offset) as f64;
    let secant = b.value - a.value;
    let m_a = match before {
        Some(p) => (b.value - p.value) / (b.offset - p.offset) as f64 * span,
        None => secant,
    };
    let m_b = match after {
        Some(n) => (n.value - a.value) / (n.offset - a.offset) as f64 * span,
        None => secant,
    };

    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * a.value + h10 * m_a + h01 * b.value + h11 * m_b
}
