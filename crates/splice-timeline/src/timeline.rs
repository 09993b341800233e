//! The timeline document: tracks plus timeline-level properties.

use serde::{Deserialize, Serialize};
use splice_core::{Frame, Profile, Result, SpliceError, TimeRange};
use std::collections::HashSet;
use uuid::Uuid;

use crate::clip::{Clip, ItemId, TrackId};
use crate::filter::{self, FilterAttachment, FilterOwner};
use crate::track::{Track, TrackItem};

/// A multitrack timeline. Track order is bottom to top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique timeline ID
    pub id: Uuid,
    /// Timeline name
    pub name: String,
    pub profile: Profile,
    pub tracks: Vec<Track>,
    /// Filters applied to the whole composite
    pub filters: Vec<FilterAttachment>,
}

impl Timeline {
    /// Create a timeline with one video and one audio track.
    pub fn new(name: impl Into<String>, profile: Profile) -> Self {
        let mut timeline = Self::empty(name, profile);
        timeline.tracks = vec![Track::new_video("V1"), Track::new_audio("A1")];
        timeline
    }

    /// Create a timeline with no tracks.
    pub fn empty(name: impl Into<String>, profile: Profile) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            profile,
            tracks: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn track(&self, id: TrackId) -> Result<&Track> {
        self.tracks
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| SpliceError::NotFound(format!("track {id}")))
    }

    pub fn track_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SpliceError::NotFound(format!("track {id}")))
    }

    pub fn track_index(&self, id: TrackId) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| SpliceError::NotFound(format!("track {id}")))
    }

    /// End of the longest track.
    pub fn duration(&self) -> Frame {
        self.tracks.iter().map(Track::duration).max().unwrap_or(0)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(0, self.duration())
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(Track::clip_count).sum()
    }

    /// Every clip with the track it lives on.
    pub fn clips(&self) -> impl Iterator<Item = (TrackId, &Clip)> + '_ {
        self.tracks.iter().flat_map(|track| {
            track
                .items
                .iter()
                .filter_map(TrackItem::as_clip)
                .map(move |clip| (track.id, clip))
        })
    }

    /// Locate an item anywhere in the timeline.
    pub fn find_item(&self, id: ItemId) -> Option<(TrackId, &TrackItem)> {
        self.tracks
            .iter()
            .find_map(|track| track.item(id).map(|item| (track.id, item)))
    }

    /// Closest item boundary strictly before `frame` on any track.
    pub fn previous_edit(&self, frame: Frame) -> Option<Frame> {
        self.tracks
            .iter()
            .flat_map(Track::edit_points)
            .filter(|&p| p < frame)
            .max()
    }

    /// Closest item boundary strictly after `frame` on any track.
    pub fn next_edit(&self, frame: Frame) -> Option<Frame> {
        self.tracks
            .iter()
            .flat_map(Track::edit_points)
            .filter(|&p| p > frame)
            .min()
    }

    /// Insert a track at `index` (top of the stack when `None`).
    pub fn add_track(&mut self, track: Track, index: Option<usize>) -> Result<()> {
        if self.tracks.iter().any(|t| t.id == track.id) {
            return Err(SpliceError::RangeConflict(format!(
                "track {} is already in the timeline",
                track.id
            )));
        }
        track.validate()?;
        let index = index.unwrap_or(self.tracks.len()).min(self.tracks.len());
        self.tracks.insert(index, track);
        Ok(())
    }

    /// Remove a track and everything on it.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track> {
        let idx = self.track_index(id)?;
        if self.tracks[idx].locked {
            return Err(SpliceError::TrackLocked(self.tracks[idx].name.clone()));
        }
        Ok(self.tracks.remove(idx))
    }

    /// Move a clip into empty space at `position`, on the same or another track.
    pub fn move_clip(
        &mut self,
        from: TrackId,
        item: ItemId,
        to: TrackId,
        position: Frame,
    ) -> Result<()> {
        let fi = self.track_index(from)?;
        let ti = self.track_index(to)?;
        if self.tracks[fi].kind != self.tracks[ti].kind {
            return Err(SpliceError::RangeConflict(format!(
                "cannot move a {:?} clip onto a {:?} track",
                self.tracks[fi].kind, self.tracks[ti].kind
            )));
        }
        if position < 0 {
            return Err(SpliceError::InvalidRange(format!(
                "frame {position} is negative"
            )));
        }

        let mut source = self.tracks[fi].clone();
        let mut clip = source.take_clip(item)?;
        clip.start = position;
        if fi == ti {
            source.place_clip(clip)?;
        } else {
            self.tracks[ti].place_clip(clip)?;
        }
        self.tracks[fi] = source;
        Ok(())
    }

    /// Filter list belonging to `owner`.
    pub fn filters(&self, owner: FilterOwner) -> Result<&[FilterAttachment]> {
        Ok(match owner {
            FilterOwner::Timeline => self.filters.as_slice(),
            FilterOwner::Track(id) => self.track(id)?.filters.as_slice(),
            FilterOwner::Item { track, item } => match self.track(track)?.item(item) {
                Some(TrackItem::Clip(clip)) => clip.filters.as_slice(),
                Some(TrackItem::Transition(t)) => t.filters.as_slice(),
                None => return Err(SpliceError::NotFound(format!("item {item}"))),
            },
        })
    }

    fn filters_mut(&mut self, owner: FilterOwner) -> Result<&mut Vec<FilterAttachment>> {
        match owner {
            FilterOwner::Timeline => Ok(&mut self.filters),
            FilterOwner::Track(id) => Ok(&mut self.track_mut(id)?.filters),
            FilterOwner::Item { track, item } => self
                .track_mut(track)?
                .items
                .iter_mut()
                .find(|i| i.id() == item)
                .map(TrackItem::filters_mut)
                .ok_or_else(|| SpliceError::NotFound(format!("item {item}"))),
        }
    }

    /// Attach a filter. Its scope is set from the owner.
    pub fn attach_filter(
        &mut self,
        owner: FilterOwner,
        mut filter: FilterAttachment,
        index: Option<usize>,
    ) -> Result<()> {
        filter.scope = owner.scope();
        if !filter.keys_well_ordered() {
            return Err(SpliceError::InvalidRange(format!(
                "{} filter has unordered keyframes",
                filter.filter_type
            )));
        }
        filter::attach(self.filters_mut(owner)?, filter, index)
    }

    pub fn detach_filter(&mut self, owner: FilterOwner, id: Uuid) -> Result<FilterAttachment> {
        filter::detach(self.filters_mut(owner)?, id)
    }

    pub fn move_filter(&mut self, owner: FilterOwner, id: Uuid, to_index: usize) -> Result<()> {
        filter::reorder(self.filters_mut(owner)?, id, to_index)
    }

    pub fn filter_mut(&mut self, owner: FilterOwner, id: Uuid) -> Result<&mut FilterAttachment> {
        filter::find_mut(self.filters_mut(owner)?, id)
    }

    /// Check every structural invariant of the document.
    pub fn validate(&self) -> Result<()> {
        let mut track_ids = HashSet::with_capacity(self.tracks.len());
        for track in &self.tracks {
            if !track_ids.insert(track.id) {
                return Err(SpliceError::InvalidRange(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
            track.validate()?;
        }
        self.profile.validate()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Untitled", Profile::default())
    }
}
