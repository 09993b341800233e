//! Track types and the single-track edit algorithms.
//!
//! Every structural operation runs on a staged copy of the track, which is
//! validated and swapped in only if the whole operation succeeds.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use splice_core::limits::MIN_CLIP_LENGTH;
use splice_core::{Frame, Result, SpliceError, TimeRange};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::clip::{Clip, FadeEdge, ItemId, TrackId};
use crate::filter::FilterAttachment;
use crate::transition::Transition;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Filter,
}

/// How a track composites onto the tracks below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
    Overlay,
}

/// An item in a track (clip or transition). Gaps are implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackItem {
    Clip(Clip),
    Transition(Transition),
}

impl TrackItem {
    pub fn id(&self) -> ItemId {
        match self {
            TrackItem::Clip(clip) => clip.id,
            TrackItem::Transition(t) => t.id,
        }
    }

    pub fn start(&self) -> Frame {
        match self {
            TrackItem::Clip(clip) => clip.start,
            TrackItem::Transition(t) => t.start,
        }
    }

    /// Get the duration of this item.
    pub fn length(&self) -> Frame {
        match self {
            TrackItem::Clip(clip) => clip.length(),
            TrackItem::Transition(t) => t.length,
        }
    }

    pub fn end(&self) -> Frame {
        self.start() + self.length()
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start(), self.length())
    }

    pub fn as_clip(&self) -> Option<&Clip> {
        match self {
            TrackItem::Clip(clip) => Some(clip),
            TrackItem::Transition(_) => None,
        }
    }

    pub fn as_clip_mut(&mut self) -> Option<&mut Clip> {
        match self {
            TrackItem::Clip(clip) => Some(clip),
            TrackItem::Transition(_) => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            TrackItem::Transition(t) => Some(t),
            TrackItem::Clip(_) => None,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, TrackItem::Transition(_))
    }

    /// Filters attached to this item.
    pub fn filters_mut(&mut self) -> &mut Vec<FilterAttachment> {
        match self {
            TrackItem::Clip(clip) => &mut clip.filters,
            TrackItem::Transition(t) => &mut t.filters,
        }
    }

    fn shift(&mut self, delta: Frame) {
        match self {
            TrackItem::Clip(clip) => clip.start += delta,
            TrackItem::Transition(t) => t.start += delta,
        }
    }
}

/// A metadata change on a track. Always legal, even when locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackFlag {
    Muted(bool),
    Hidden(bool),
    Locked(bool),
    Blend(BlendMode),
    Name(String),
}

/// A track holding clips and transitions ordered by start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track kind
    pub kind: TrackKind,
    /// Track name
    pub name: String,
    /// Items in this track, strictly ordered and non-overlapping
    pub items: Vec<TrackItem>,
    /// Is track muted
    pub muted: bool,
    /// Is track hidden from the composite
    pub hidden: bool,
    /// Is track locked (prevent structural edits)
    pub locked: bool,
    pub blend_mode: BlendMode,
    pub filters: Vec<FilterAttachment>,
}

impl Track {
    /// Create an empty track.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            items: Vec::new(),
            muted: false,
            hidden: false,
            locked: false,
            blend_mode: BlendMode::Normal,
            filters: Vec::new(),
        }
    }

    /// Create a new video track.
    pub fn new_video(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    /// End of the last item.
    pub fn duration(&self) -> Frame {
        self.items.last().map_or(0, TrackItem::end)
    }

    /// Number of clips (excluding transitions) in this track.
    pub fn clip_count(&self) -> usize {
        self.items.iter().filter(|item| item.as_clip().is_some()).count()
    }

    pub fn item(&self, id: ItemId) -> Option<&TrackItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn item_index(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Item covering `frame`, if any.
    pub fn item_at(&self, frame: Frame) -> Option<&TrackItem> {
        let idx = self.items.partition_point(|item| item.end() <= frame);
        self.items.get(idx).filter(|item| item.range().contains(frame))
    }

    /// Find a clip by id.
    pub fn clip(&self, id: ItemId) -> Result<&Clip> {
        let idx = self.clip_index(id)?;
        self.items[idx]
            .as_clip()
            .ok_or_else(|| SpliceError::NotFound(format!("clip {id}")))
    }

    /// Every frame where an item starts or ends.
    pub fn edit_points(&self) -> impl Iterator<Item = Frame> + '_ {
        self.items.iter().flat_map(|item| [item.start(), item.end()])
    }

    fn clip_index(&self, id: ItemId) -> Result<usize> {
        let idx = self
            .item_index(id)
            .ok_or_else(|| SpliceError::NotFound(format!("item {id} on track '{}'", self.name)))?;
        if self.items[idx].is_transition() {
            return Err(SpliceError::RangeConflict(format!(
                "item {id} is a transition, not a clip"
            )));
        }
        Ok(idx)
    }

    fn clip_mut(&mut self, idx: usize) -> Result<&mut Clip> {
        self.items
            .get_mut(idx)
            .and_then(TrackItem::as_clip_mut)
            .ok_or_else(|| SpliceError::NotFound(format!("clip at index {idx}")))
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(SpliceError::TrackLocked(self.name.clone()));
        }
        Ok(())
    }

    /// Run `edit` on a copy and keep the result only if it succeeds and validates.
    fn transact(&mut self, edit: impl FnOnce(&mut Track) -> Result<()>) -> Result<()> {
        let mut staged = self.clone();
        edit(&mut staged)?;
        staged.validate()?;
        *self = staged;
        Ok(())
    }

    fn insert_sorted(&mut self, item: TrackItem) {
        let idx = self.items.partition_point(|i| i.start() < item.start());
        self.items.insert(idx, item);
    }

    fn shift_from(&mut self, from: Frame, delta: Frame) {
        for item in self.items.iter_mut().filter(|i| i.start() >= from) {
            item.shift(delta);
        }
    }

    fn shift_after(&mut self, idx: usize, delta: Frame) {
        for item in self.items.iter_mut().skip(idx + 1) {
            item.shift(delta);
        }
    }

    fn transition_touching(&self, frame: Frame) -> Option<&Transition> {
        self.items
            .iter()
            .filter_map(TrackItem::as_transition)
            .find(|t| t.start <= frame && frame <= t.end())
    }

    // ── Structural edits ─────────────────────────────────────────

    /// Add a clip at the end of the track.
    pub fn append(&mut self, mut clip: Clip) -> Result<()> {
        self.ensure_unlocked()?;
        clip.validate()?;
        clip.start = self.duration();
        self.items.push(TrackItem::Clip(clip));
        Ok(())
    }

    /// Insert `clip` at `at`, rippling everything from `at` onwards.
    ///
    /// A clip straddling `at` is split first; its right half gets `split_id`.
    pub fn insert(&mut self, mut clip: Clip, at: Frame, split_id: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        check_position(at)?;
        clip.validate()?;
        if let Some(t) = self.transition_touching(at) {
            return Err(SpliceError::RangeConflict(format!(
                "cannot insert at {at} inside transition {}",
                t.range()
            )));
        }

        self.transact(|track| {
            let straddling = track
                .items
                .iter()
                .position(|item| item.start() < at && at < item.end());
            if let Some(idx) = straddling {
                let left = track.clip_mut(idx)?;
                let right = left.split_off(at - left.start, split_id)?;
                track.items.insert(idx + 1, TrackItem::Clip(right));
            }
            track.shift_from(at, clip.length());
            clip.start = at;
            track.insert_sorted(TrackItem::Clip(clip));
            Ok(())
        })
    }

    /// Place `clip` at `at`, replacing whatever it covers. Later items stay put.
    pub fn overwrite(&mut self, mut clip: Clip, at: Frame, split_id: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        check_position(at)?;
        clip.validate()?;
        let range = TimeRange::new(at, clip.length());
        self.transact(|track| {
            track.clear(range, split_id)?;
            clip.start = at;
            track.insert_sorted(TrackItem::Clip(clip));
            Ok(())
        })
    }

    /// Remove everything inside `range`, leaving a gap.
    pub fn lift(&mut self, range: TimeRange, split_id: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        check_range(range)?;
        self.transact(|track| track.clear(range, split_id))
    }

    /// Remove everything inside `range` and close the gap.
    pub fn ripple_delete(&mut self, range: TimeRange, split_id: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        check_range(range)?;
        self.transact(|track| {
            track.clear(range, split_id)?;
            track.shift_from(range.end(), -range.length);
            track.heal_at(range.start);
            track.purge_orphan_transitions();
            Ok(())
        })
    }

    /// Clear `range`: covered items go, partially covered clips are cut.
    fn clear(&mut self, range: TimeRange, split_id: ItemId) -> Result<()> {
        let mut kept = Vec::with_capacity(self.items.len() + 1);
        for item in std::mem::take(&mut self.items) {
            let r = item.range();
            if !r.intersects(range) {
                kept.push(item);
                continue;
            }
            let TrackItem::Clip(mut clip) = item else {
                continue;
            };
            if range.contains_range(r) {
                continue;
            }
            if r.start < range.start && r.end() > range.end() {
                let mut right = clip.split_off(range.start - r.start, split_id)?;
                right.resize_head(r.end() - range.end())?;
                kept.push(TrackItem::Clip(clip));
                kept.push(TrackItem::Clip(right));
            } else if r.start < range.start {
                clip.resize_tail(range.start - r.start)?;
                kept.push(TrackItem::Clip(clip));
            } else {
                clip.resize_head(r.end() - range.end())?;
                kept.push(TrackItem::Clip(clip));
            }
        }
        self.items = kept;
        self.purge_orphan_transitions();
        Ok(())
    }

    /// Merge the clips meeting at `frame` if they are one continuous piece of source.
    fn heal_at(&mut self, frame: Frame) {
        let Some(idx) = self.items.iter().position(|item| item.end() == frame) else {
            return;
        };
        let joinable = match (self.items.get(idx), self.items.get(idx + 1)) {
            (Some(TrackItem::Clip(left)), Some(TrackItem::Clip(right))) => {
                left.continues_into(right)
            }
            _ => false,
        };
        if !joinable {
            return;
        }
        if let TrackItem::Clip(right) = self.items.remove(idx + 1) {
            if let Some(left) = self.items[idx].as_clip_mut() {
                debug!(left = %left.id, right = %right.id, "healing ripple join");
                left.absorb(right);
            }
        }
    }

    /// Drop transitions that no longer sit between two touching clips.
    fn purge_orphan_transitions(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.items.len())
            .map(|i| match &self.items[i] {
                TrackItem::Clip(_) => true,
                TrackItem::Transition(t) => self.transition_is_joined(i, t),
            })
            .collect();
        let before = self.items.len();
        let mut flags = keep.into_iter();
        self.items.retain(|_| flags.next().unwrap_or(true));
        let dropped = before - self.items.len();
        if dropped > 0 {
            debug!(track = %self.id, dropped, "dropped orphaned transitions");
        }
        dropped
    }

    fn transition_is_joined(&self, idx: usize, t: &Transition) -> bool {
        let left_ok = idx
            .checked_sub(1)
            .and_then(|i| self.items.get(i))
            .and_then(TrackItem::as_clip)
            .is_some_and(|c| c.end() == t.start);
        let right_ok = self
            .items
            .get(idx + 1)
            .and_then(TrackItem::as_clip)
            .is_some_and(|c| c.start == t.end());
        left_ok && right_ok
    }

    /// Move a clip's head to `new_start`.
    ///
    /// In ripple mode the clip start stays where it is and every later item
    /// moves by the length change instead.
    pub fn trim_in(&mut self, item: ItemId, new_start: Frame, ripple: bool) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self.clip_index(item)?;
        let clip = self.clip(item)?;
        let prev = idx.checked_sub(1).map(|i| &self.items[i]);

        if let Some(TrackItem::Transition(t)) = prev {
            if t.end() == clip.start {
                return Err(SpliceError::RangeConflict(format!(
                    "head of '{}' is joined to a transition",
                    clip.name
                )));
            }
        }
        let new_length = clip.end() - new_start;
        if new_length < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!(
                "trimming '{}' to start at {new_start} leaves nothing",
                clip.name
            )));
        }
        if !ripple {
            check_position(new_start)?;
            if let Some(prev) = prev.filter(|p| p.end() > new_start) {
                return Err(SpliceError::RangeConflict(format!(
                    "'{}' cannot start at {new_start}: previous item ends at {}",
                    clip.name,
                    prev.end()
                )));
            }
        }
        let growth = clip.start - new_start;
        if growth > clip.head_headroom() {
            return Err(SpliceError::InsufficientTrim(format!(
                "'{}' has {} frames before its in point, {growth} needed",
                clip.name,
                clip.head_headroom()
            )));
        }

        self.transact(|track| {
            let clip = track.clip_mut(idx)?;
            let (old_start, old_length) = (clip.start, clip.length());
            clip.resize_head(new_length)?;
            if ripple {
                let delta = clip.length() - old_length;
                clip.start = old_start;
                track.shift_after(idx, delta);
            }
            Ok(())
        })
    }

    /// Move a clip's tail to `new_end`.
    pub fn trim_out(&mut self, item: ItemId, new_end: Frame, ripple: bool) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self.clip_index(item)?;
        let clip = self.clip(item)?;
        let next = self.items.get(idx + 1);

        if let Some(TrackItem::Transition(t)) = next {
            if t.start == clip.end() {
                return Err(SpliceError::RangeConflict(format!(
                    "tail of '{}' is joined to a transition",
                    clip.name
                )));
            }
        }
        let new_length = new_end - clip.start;
        if new_length < MIN_CLIP_LENGTH {
            return Err(SpliceError::InvalidRange(format!(
                "trimming '{}' to end at {new_end} leaves nothing",
                clip.name
            )));
        }
        if !ripple {
            if let Some(next) = next.filter(|n| n.start() < new_end) {
                return Err(SpliceError::RangeConflict(format!(
                    "'{}' cannot end at {new_end}: next item starts at {}",
                    clip.name,
                    next.start()
                )));
            }
        }
        let growth = new_end - clip.end();
        if growth > clip.tail_headroom() {
            return Err(SpliceError::InsufficientTrim(format!(
                "'{}' has {} frames after its out point, {growth} needed",
                clip.name,
                clip.tail_headroom()
            )));
        }

        self.transact(|track| {
            let clip = track.clip_mut(idx)?;
            let old_length = clip.length();
            clip.resize_tail(new_length)?;
            if ripple {
                let delta = clip.length() - old_length;
                track.shift_after(idx, delta);
            }
            Ok(())
        })
    }

    /// Divide a clip at timeline frame `at`. The right half gets `right_id`.
    pub fn split(&mut self, item: ItemId, at: Frame, right_id: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self
            .item_index(item)
            .ok_or_else(|| SpliceError::NotFound(format!("item {item} on track '{}'", self.name)))?;
        if self.items[idx].is_transition() {
            return Err(SpliceError::RangeConflict(
                "a transition cannot be split".to_string(),
            ));
        }
        self.transact(|track| {
            let clip = track.clip_mut(idx)?;
            let right = clip.split_off(at - clip.start, right_id)?;
            track.items.insert(idx + 1, TrackItem::Clip(right));
            Ok(())
        })
    }

    /// Turn the cut between two touching clips into a transition.
    pub fn add_transition(
        &mut self,
        left: ItemId,
        right: ItemId,
        duration: Frame,
        transition_id: ItemId,
        type_id: &str,
    ) -> Result<()> {
        self.ensure_unlocked()?;
        let li = self.clip_index(left)?;
        let ri = self.clip_index(right)?;
        let (lc, rc) = (self.clip(left)?, self.clip(right)?);
        if ri != li + 1 || lc.end() != rc.start {
            return Err(SpliceError::RangeConflict(format!(
                "'{}' and '{}' do not touch",
                lc.name, rc.name
            )));
        }
        if duration < 1 {
            return Err(SpliceError::InvalidRange(format!(
                "transition duration {duration} is not positive"
            )));
        }

        let head = (duration / 2)
            .min(rc.head_headroom())
            .min(lc.length() - 1)
            .max(0);
        let tail = (duration - duration / 2)
            .min(lc.tail_headroom())
            .min(rc.length() - 1)
            .max(0);
        if head + tail == 0 {
            return Err(SpliceError::InsufficientTrim(format!(
                "no spare source material around the cut between '{}' and '{}'",
                lc.name, rc.name
            )));
        }
        let cut = lc.end();

        self.transact(|track| {
            let left_clip = track.clip_mut(li)?;
            let new_len = left_clip.length() - head;
            left_clip.resize_tail(new_len)?;
            let start = left_clip.end();
            let right_clip = track.clip_mut(ri)?;
            let new_len = right_clip.length() - tail;
            right_clip.resize_head(new_len)?;
            let end = right_clip.start;

            let transition = Transition::with_id(
                transition_id,
                type_id,
                TimeRange::from_start_end(start, end),
                cut - start,
            );
            track.items.insert(ri, TrackItem::Transition(transition));
            Ok(())
        })
    }

    /// Delete a transition and extend both neighbours back to the cut.
    pub fn remove_transition(&mut self, item: ItemId) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self
            .item_index(item)
            .ok_or_else(|| SpliceError::NotFound(format!("transition {item}")))?;
        let cut = match &self.items[idx] {
            TrackItem::Transition(t) => t.cut(),
            TrackItem::Clip(c) => {
                return Err(SpliceError::RangeConflict(format!(
                    "'{}' is a clip, not a transition",
                    c.name
                )))
            }
        };
        self.transact(|track| {
            track.items.remove(idx);
            let left = track.clip_mut(idx - 1)?;
            let new_len = cut - left.start;
            left.resize_tail(new_len)?;
            let right = track.clip_mut(idx)?;
            let new_len = right.end() - cut;
            right.resize_head(new_len)
        })
    }

    /// Take a clip off the track, dropping any transitions joined to it.
    pub fn take_clip(&mut self, item: ItemId) -> Result<Clip> {
        self.ensure_unlocked()?;
        let idx = self.clip_index(item)?;
        let mut taken = None;
        self.transact(|track| {
            if let TrackItem::Clip(clip) = track.items.remove(idx) {
                taken = Some(clip);
            }
            track.purge_orphan_transitions();
            Ok(())
        })?;
        taken.ok_or_else(|| SpliceError::NotFound(format!("clip {item}")))
    }

    /// Put a clip into empty space at its own `start`.
    pub fn place_clip(&mut self, clip: Clip) -> Result<()> {
        self.ensure_unlocked()?;
        clip.validate()?;
        let range = clip.range();
        if let Some(other) = self.items.iter().find(|i| i.range().intersects(range)) {
            return Err(SpliceError::RangeConflict(format!(
                "{range} overlaps item at {}",
                other.range()
            )));
        }
        self.transact(|track| {
            track.insert_sorted(TrackItem::Clip(clip));
            Ok(())
        })
    }

    /// Set a fade length on a clip.
    pub fn set_fade(&mut self, item: ItemId, edge: FadeEdge, length: Frame) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self.clip_index(item)?;
        self.transact(|track| track.clip_mut(idx)?.set_fade(edge, length))
    }

    /// Change a clip's speed, keeping its source window and start.
    pub fn set_speed(&mut self, item: ItemId, speed: Rational64) -> Result<()> {
        self.ensure_unlocked()?;
        let idx = self.clip_index(item)?;
        let mut resized = self.clip(item)?.clone();
        let old_end = resized.end();
        resized.set_speed(speed)?;
        if let Some(next) = self.items.get(idx + 1) {
            let joined = next.is_transition() && next.start() == old_end;
            if next.start() < resized.end() || (joined && resized.end() != old_end) {
                return Err(SpliceError::RangeConflict(format!(
                    "'{}' at speed {speed} would end at {}, next item starts at {}",
                    resized.name,
                    resized.end(),
                    next.start()
                )));
            }
        }
        self.transact(|track| track.clip_mut(idx)?.set_speed(speed))
    }

    /// Apply a metadata change.
    pub fn set_flag(&mut self, flag: TrackFlag) {
        match flag {
            TrackFlag::Muted(v) => self.muted = v,
            TrackFlag::Hidden(v) => self.hidden = v,
            TrackFlag::Locked(v) => self.locked = v,
            TrackFlag::Blend(mode) => self.blend_mode = mode,
            TrackFlag::Name(name) => self.name = name,
        }
    }

    /// Check ordering, overlap, clip and transition invariants.
    pub fn validate(&self) -> Result<()> {
        let fault = |msg: String| SpliceError::InvalidRange(format!("track '{}': {msg}", self.name));
        let mut ids = HashSet::with_capacity(self.items.len());

        for (idx, item) in self.items.iter().enumerate() {
            if !ids.insert(item.id()) {
                return Err(fault(format!("duplicate item id {}", item.id())));
            }
            match item {
                TrackItem::Clip(clip) => {
                    clip.validate().map_err(|e| fault(e.to_string()))?;
                    if !clip.filters.iter().all(FilterAttachment::keys_well_ordered) {
                        return Err(fault(format!("'{}' has unordered keyframes", clip.name)));
                    }
                }
                TrackItem::Transition(t) => {
                    if t.length < 1 || t.head < 0 || t.head > t.length || t.start < 0 {
                        return Err(fault(format!("malformed transition at {}", t.range())));
                    }
                    if !self.transition_is_joined(idx, t) {
                        return Err(fault(format!(
                            "transition at {} is not between two touching clips",
                            t.range()
                        )));
                    }
                }
            }
            if let Some(next) = self.items.get(idx + 1) {
                if item.end() > next.start() {
                    return Err(fault(format!(
                        "{} overlaps {}",
                        item.range(),
                        next.range()
                    )));
                }
            }
        }
        if !self.filters.iter().all(FilterAttachment::keys_well_ordered) {
            return Err(fault("track filter has unordered keyframes".to_string()));
        }
        Ok(())
    }
}

/// Span of frames that differ between two versions of a track.
///
/// Metadata-only changes report the whole track; identical tracks report `None`.
pub fn changed_range(before: &Track, after: &Track) -> Option<TimeRange> {
    if before == after {
        return None;
    }
    let prefix = before
        .items
        .iter()
        .zip(&after.items)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = before.items[prefix..]
        .iter()
        .rev()
        .zip(after.items[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old = &before.items[prefix..before.items.len() - suffix];
    let new = &after.items[prefix..after.items.len() - suffix];

    let bounds = old.iter().chain(new).map(|item| (item.start(), item.end()));
    let span = bounds.fold(None, |acc: Option<(Frame, Frame)>, (s, e)| {
        Some(acc.map_or((s, e), |(a, b)| (a.min(s), b.max(e))))
    });
    Some(match span {
        Some((start, end)) => TimeRange::from_start_end(start, end),
        None => TimeRange::new(0, before.duration().max(after.duration())),
    })
}

fn check_position(at: Frame) -> Result<()> {
    if at < 0 {
        return Err(SpliceError::InvalidRange(format!("frame {at} is negative")));
    }
    Ok(())
}

fn check_range(range: TimeRange) -> Result<()> {
    TimeRange::checked(range.start, range.length)?;
    if range.is_empty() {
        return Err(SpliceError::InvalidRange(format!("{range} is empty")));
    }
    Ok(())
}
