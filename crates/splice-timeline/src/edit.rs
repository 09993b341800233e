//! Edit commands with exact undo/redo.
//!
//! Every mutation is an [`EditCommand`] wrapping a closed [`EditOp`]. Applying
//! a command runs the op on a staged copy of the timeline, validates it, and
//! records before/after snapshots of the tracks it touched. Undo and redo
//! restore those snapshots after checking that the live timeline is exactly
//! the state they expect.

use num_rational::Rational64;
use smallvec::{smallvec, SmallVec};
use splice_core::{Frame, Profile, Result, SpliceError, TimeRange};
use tracing::{debug, error};
use uuid::Uuid;

use crate::clip::{Clip, FadeEdge, ItemId, TrackId};
use crate::filter::{FilterAttachment, FilterOwner, ParamValue};
use crate::timeline::Timeline;
use crate::track::{changed_range, Track, TrackFlag};

// ── Operations ──────────────────────────────────────────────────

/// One reversible change to a timeline.
///
/// Ids for items the op creates (split halves, transitions) are chosen when
/// the op is built, so replaying it produces the same document.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    Append {
        track: TrackId,
        clip: Clip,
    },
    Insert {
        track: TrackId,
        clip: Clip,
        at: Frame,
        split_id: ItemId,
    },
    Overwrite {
        track: TrackId,
        clip: Clip,
        at: Frame,
        split_id: ItemId,
    },
    Lift {
        track: TrackId,
        range: TimeRange,
        split_id: ItemId,
    },
    RippleDelete {
        track: TrackId,
        range: TimeRange,
        split_id: ItemId,
    },
    TrimIn {
        track: TrackId,
        item: ItemId,
        new_start: Frame,
        ripple: bool,
    },
    TrimOut {
        track: TrackId,
        item: ItemId,
        new_end: Frame,
        ripple: bool,
    },
    Split {
        track: TrackId,
        item: ItemId,
        at: Frame,
        right_id: ItemId,
    },
    AddTransition {
        track: TrackId,
        left: ItemId,
        right: ItemId,
        duration: Frame,
        transition_id: ItemId,
        type_id: String,
    },
    RemoveTransition {
        track: TrackId,
        item: ItemId,
    },
    MoveClip {
        from: TrackId,
        item: ItemId,
        to: TrackId,
        position: Frame,
    },
    SetFade {
        track: TrackId,
        item: ItemId,
        edge: FadeEdge,
        length: Frame,
    },
    SetSpeed {
        track: TrackId,
        item: ItemId,
        speed: Rational64,
    },
    SetTrackFlag {
        track: TrackId,
        flag: TrackFlag,
    },
    AddTrack {
        track: Track,
        index: Option<usize>,
    },
    RemoveTrack {
        track: TrackId,
    },
    SetProfile {
        profile: Profile,
    },
    AttachFilter {
        owner: FilterOwner,
        filter: FilterAttachment,
        index: Option<usize>,
    },
    DetachFilter {
        owner: FilterOwner,
        filter: Uuid,
    },
    MoveFilter {
        owner: FilterOwner,
        filter: Uuid,
        to_index: usize,
    },
    SetParameter {
        owner: FilterOwner,
        filter: Uuid,
        name: String,
        value: ParamValue,
    },
    SetKeyframe {
        owner: FilterOwner,
        filter: Uuid,
        name: String,
        offset: Frame,
        value: f64,
    },
    RemoveKeyframe {
        owner: FilterOwner,
        filter: Uuid,
        name: String,
        offset: Frame,
    },
    SetKeyframesEnabled {
        owner: FilterOwner,
        filter: Uuid,
        enabled: bool,
        /// Offset whose value is kept when animation is switched off.
        playhead: Frame,
    },
}

/// Part of the document an op can change.
enum Scope {
    Tracks(SmallVec<[TrackId; 2]>),
    Document,
}

impl EditOp {
    /// Human-readable name for history menus.
    pub fn label(&self) -> String {
        match self {
            Self::Append { clip, .. } => format!("Append '{}'", clip.name),
            Self::Insert { clip, .. } => format!("Insert '{}'", clip.name),
            Self::Overwrite { clip, .. } => format!("Overwrite with '{}'", clip.name),
            Self::Lift { .. } => "Lift".to_string(),
            Self::RippleDelete { .. } => "Ripple delete".to_string(),
            Self::TrimIn { .. } => "Trim in".to_string(),
            Self::TrimOut { .. } => "Trim out".to_string(),
            Self::Split { .. } => "Split".to_string(),
            Self::AddTransition { type_id, .. } => format!("Add {type_id} transition"),
            Self::RemoveTransition { .. } => "Remove transition".to_string(),
            Self::MoveClip { .. } => "Move clip".to_string(),
            Self::SetFade { edge: FadeEdge::In, .. } => "Fade in".to_string(),
            Self::SetFade { edge: FadeEdge::Out, .. } => "Fade out".to_string(),
            Self::SetSpeed { speed, .. } => format!("Speed {speed}"),
            Self::SetTrackFlag { flag, .. } => match flag {
                TrackFlag::Muted(true) => "Mute track".to_string(),
                TrackFlag::Muted(false) => "Unmute track".to_string(),
                TrackFlag::Hidden(true) => "Hide track".to_string(),
                TrackFlag::Hidden(false) => "Show track".to_string(),
                TrackFlag::Locked(true) => "Lock track".to_string(),
                TrackFlag::Locked(false) => "Unlock track".to_string(),
                TrackFlag::Blend(mode) => format!("Blend mode {mode:?}"),
                TrackFlag::Name(name) => format!("Rename track to '{name}'"),
            },
            Self::AddTrack { track, .. } => format!("Add track '{}'", track.name),
            Self::RemoveTrack { .. } => "Remove track".to_string(),
            Self::SetProfile { .. } => "Change video mode".to_string(),
            Self::AttachFilter { filter, .. } => format!("Add {} filter", filter.filter_type),
            Self::DetachFilter { .. } => "Remove filter".to_string(),
            Self::MoveFilter { .. } => "Reorder filter".to_string(),
            Self::SetParameter { name, .. } => format!("Change {name}"),
            Self::SetKeyframe { name, .. } => format!("Set {name} keyframe"),
            Self::RemoveKeyframe { name, .. } => format!("Remove {name} keyframe"),
            Self::SetKeyframesEnabled { enabled: true, .. } => "Enable keyframes".to_string(),
            Self::SetKeyframesEnabled { enabled: false, .. } => "Disable keyframes".to_string(),
        }
    }

    fn scope(&self) -> Scope {
        match self {
            Self::Append { track, .. }
            | Self::Insert { track, .. }
            | Self::Overwrite { track, .. }
            | Self::Lift { track, .. }
            | Self::RippleDelete { track, .. }
            | Self::TrimIn { track, .. }
            | Self::TrimOut { track, .. }
            | Self::Split { track, .. }
            | Self::AddTransition { track, .. }
            | Self::RemoveTransition { track, .. }
            | Self::SetFade { track, .. }
            | Self::SetSpeed { track, .. }
            | Self::SetTrackFlag { track, .. } => Scope::Tracks(smallvec![*track]),
            Self::MoveClip { from, to, .. } if from == to => Scope::Tracks(smallvec![*from]),
            Self::MoveClip { from, to, .. } => Scope::Tracks(smallvec![*from, *to]),
            Self::AddTrack { .. } | Self::RemoveTrack { .. } | Self::SetProfile { .. } => {
                Scope::Document
            }
            Self::AttachFilter { owner, .. }
            | Self::DetachFilter { owner, .. }
            | Self::MoveFilter { owner, .. }
            | Self::SetParameter { owner, .. }
            | Self::SetKeyframe { owner, .. }
            | Self::RemoveKeyframe { owner, .. }
            | Self::SetKeyframesEnabled { owner, .. } => match owner {
                FilterOwner::Timeline => Scope::Document,
                FilterOwner::Track(track) | FilterOwner::Item { track, .. } => {
                    Scope::Tracks(smallvec![*track])
                }
            },
        }
    }

    /// Run the op against `timeline` in place.
    fn execute(&self, timeline: &mut Timeline) -> Result<()> {
        match self {
            Self::Append { track, clip } => timeline.track_mut(*track)?.append(clip.clone()),
            Self::Insert {
                track,
                clip,
                at,
                split_id,
            } => timeline
                .track_mut(*track)?
                .insert(clip.clone(), *at, *split_id),
            Self::Overwrite {
                track,
                clip,
                at,
                split_id,
            } => timeline
                .track_mut(*track)?
                .overwrite(clip.clone(), *at, *split_id),
            Self::Lift {
                track,
                range,
                split_id,
            } => timeline.track_mut(*track)?.lift(*range, *split_id),
            Self::RippleDelete {
                track,
                range,
                split_id,
            } => timeline.track_mut(*track)?.ripple_delete(*range, *split_id),
            Self::TrimIn {
                track,
                item,
                new_start,
                ripple,
            } => timeline
                .track_mut(*track)?
                .trim_in(*item, *new_start, *ripple),
            Self::TrimOut {
                track,
                item,
                new_end,
                ripple,
            } => timeline.track_mut(*track)?.trim_out(*item, *new_end, *ripple),
            Self::Split {
                track,
                item,
                at,
                right_id,
            } => timeline.track_mut(*track)?.split(*item, *at, *right_id),
            Self::AddTransition {
                track,
                left,
                right,
                duration,
                transition_id,
                type_id,
            } => timeline.track_mut(*track)?.add_transition(
                *left,
                *right,
                *duration,
                *transition_id,
                type_id,
            ),
            Self::RemoveTransition { track, item } => {
                timeline.track_mut(*track)?.remove_transition(*item)
            }
            Self::MoveClip {
                from,
                item,
                to,
                position,
            } => timeline.move_clip(*from, *item, *to, *position),
            Self::SetFade {
                track,
                item,
                edge,
                length,
            } => timeline.track_mut(*track)?.set_fade(*item, *edge, *length),
            Self::SetSpeed { track, item, speed } => {
                timeline.track_mut(*track)?.set_speed(*item, *speed)
            }
            Self::SetTrackFlag { track, flag } => {
                timeline.track_mut(*track)?.set_flag(flag.clone());
                Ok(())
            }
            Self::AddTrack { track, index } => timeline.add_track(track.clone(), *index),
            Self::RemoveTrack { track } => timeline.remove_track(*track).map(drop),
            Self::SetProfile { profile } => {
                profile.validate()?;
                timeline.profile = *profile;
                Ok(())
            }
            Self::AttachFilter {
                owner,
                filter,
                index,
            } => timeline.attach_filter(*owner, filter.clone(), *index),
            Self::DetachFilter { owner, filter } => {
                timeline.detach_filter(*owner, *filter).map(drop)
            }
            Self::MoveFilter {
                owner,
                filter,
                to_index,
            } => timeline.move_filter(*owner, *filter, *to_index),
            Self::SetParameter {
                owner,
                filter,
                name,
                value,
            } => {
                timeline
                    .filter_mut(*owner, *filter)?
                    .set_parameter(name, value.clone());
                Ok(())
            }
            Self::SetKeyframe {
                owner,
                filter,
                name,
                offset,
                value,
            } => timeline
                .filter_mut(*owner, *filter)?
                .set_keyframe(name, *offset, *value),
            Self::RemoveKeyframe {
                owner,
                filter,
                name,
                offset,
            } => timeline
                .filter_mut(*owner, *filter)?
                .remove_keyframe(name, *offset)
                .map(drop),
            Self::SetKeyframesEnabled {
                owner,
                filter,
                enabled,
                playhead,
            } => {
                timeline
                    .filter_mut(*owner, *filter)?
                    .set_keyframes_enabled(*enabled, *playhead);
                Ok(())
            }
        }
    }
}

// ── Snapshots ───────────────────────────────────────────────────

/// Exact copy of the part of the document an op touched.
#[derive(Debug, Clone)]
enum Snapshot {
    Tracks(SmallVec<[(usize, Track); 2]>),
    Document(Box<Timeline>),
}

impl Snapshot {
    fn capture(scope: &Scope, timeline: &Timeline) -> Result<Self> {
        Ok(match scope {
            Scope::Document => Self::Document(Box::new(timeline.clone())),
            Scope::Tracks(ids) => {
                let mut tracks = SmallVec::new();
                for id in ids {
                    let idx = timeline.track_index(*id)?;
                    tracks.push((idx, timeline.tracks[idx].clone()));
                }
                Self::Tracks(tracks)
            }
        })
    }

    fn matches(&self, timeline: &Timeline) -> bool {
        match self {
            Self::Document(doc) => **doc == *timeline,
            Self::Tracks(tracks) => tracks
                .iter()
                .all(|(idx, track)| timeline.tracks.get(*idx) == Some(track)),
        }
    }

    fn restore(&self, timeline: &Timeline) -> Timeline {
        match self {
            Self::Document(doc) => (**doc).clone(),
            Self::Tracks(tracks) => {
                let mut restored = timeline.clone();
                for (idx, track) in tracks {
                    restored.tracks[*idx] = track.clone();
                }
                restored
            }
        }
    }
}

/// A region observers should refresh after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffectedRange {
    /// `None` means every track.
    pub track: Option<TrackId>,
    pub range: TimeRange,
}

pub type AffectedRanges = SmallVec<[AffectedRange; 2]>;

fn affected_ranges(before: &Snapshot, after: &Snapshot) -> AffectedRanges {
    match (before, after) {
        (Snapshot::Tracks(old), Snapshot::Tracks(new)) => old
            .iter()
            .zip(new.iter())
            .filter_map(|((_, a), (_, b))| {
                changed_range(a, b).map(|range| AffectedRange {
                    track: Some(b.id),
                    range,
                })
            })
            .collect(),
        (Snapshot::Document(old), Snapshot::Document(new)) => smallvec![AffectedRange {
            track: None,
            range: TimeRange::new(0, old.duration().max(new.duration())),
        }],
        _ => SmallVec::new(),
    }
}

// ── Commands ────────────────────────────────────────────────────

/// Lifecycle of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Applied,
    Inverted,
    /// Evicted from history; can no longer be undone or redone.
    Discarded,
}

#[derive(Debug, Clone)]
struct UndoRecord {
    before: Snapshot,
    after: Snapshot,
    affected: AffectedRanges,
}

/// A reversible edit operation on the timeline.
#[derive(Debug, Clone)]
pub struct EditCommand {
    label: String,
    op: EditOp,
    state: CommandState,
    record: Option<UndoRecord>,
}

impl EditCommand {
    pub fn new(op: EditOp) -> Self {
        Self {
            label: op.label(),
            op,
            state: CommandState::Created,
            record: None,
        }
    }

    /// Builder: replace the generated label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn op(&self) -> &EditOp {
        &self.op
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Regions changed by this command. Empty until applied.
    pub fn affected(&self) -> &[AffectedRange] {
        self.record.as_ref().map_or(&[], |r| r.affected.as_slice())
    }

    /// Run the op against `current` and return the committed result.
    ///
    /// On error `current` is untouched and the command stays `Created`.
    pub fn apply(&mut self, current: &Timeline) -> Result<Timeline> {
        if self.state != CommandState::Created {
            return Err(self.fault("apply", "command was already applied"));
        }
        let mut staged = current.clone();
        if let Err(e) = self.op.execute(&mut staged).and_then(|()| staged.validate()) {
            debug!(label = %self.label, error = %e, "edit rejected");
            return Err(e);
        }

        let scope = self.op.scope();
        let before = Snapshot::capture(&scope, current)?;
        let after = Snapshot::capture(&scope, &staged)?;
        let affected = affected_ranges(&before, &after);
        self.record = Some(UndoRecord {
            before,
            after,
            affected,
        });
        self.state = CommandState::Applied;
        debug!(label = %self.label, "applied");
        Ok(staged)
    }

    /// Restore the state before this command.
    pub fn invert(&mut self, current: &Timeline) -> Result<Timeline> {
        if self.state != CommandState::Applied {
            return Err(self.fault("undo", "command is not applied"));
        }
        let Some(record) = &self.record else {
            return Err(self.fault("undo", "no undo record"));
        };
        if !record.after.matches(current) {
            return Err(self.fault("undo", "timeline differs from the state it produced"));
        }
        let restored = record.before.restore(current);
        self.state = CommandState::Inverted;
        debug!(label = %self.label, "inverted");
        Ok(restored)
    }

    /// Restore the state after this command again.
    pub fn reapply(&mut self, current: &Timeline) -> Result<Timeline> {
        if self.state != CommandState::Inverted {
            return Err(self.fault("redo", "command is not inverted"));
        }
        let Some(record) = &self.record else {
            return Err(self.fault("redo", "no undo record"));
        };
        if !record.before.matches(current) {
            return Err(self.fault("redo", "timeline differs from the state it was undone to"));
        }
        let restored = record.after.restore(current);
        self.state = CommandState::Applied;
        debug!(label = %self.label, "reapplied");
        Ok(restored)
    }

    fn fault(&self, action: &str, reason: &str) -> SpliceError {
        error!(label = %self.label, action, reason, "edit history out of sync");
        SpliceError::Consistency(format!("cannot {action} '{}': {reason}", self.label))
    }

    /// Whether `next` continues the same trim drag as this command.
    pub fn mergeable_with(&self, next: &EditCommand) -> bool {
        if self.state != CommandState::Applied || next.state != CommandState::Applied {
            return false;
        }
        match (&self.op, &next.op) {
            (
                EditOp::TrimIn {
                    track: a,
                    item: i,
                    ripple: r,
                    ..
                },
                EditOp::TrimIn {
                    track: b,
                    item: j,
                    ripple: s,
                    ..
                },
            )
            | (
                EditOp::TrimOut {
                    track: a,
                    item: i,
                    ripple: r,
                    ..
                },
                EditOp::TrimOut {
                    track: b,
                    item: j,
                    ripple: s,
                    ..
                },
            ) => a == b && i == j && r == s,
            _ => false,
        }
    }

    /// Fold `next` into this command. Undoing the result restores the state
    /// before `self`.
    pub fn merge(self, next: EditCommand) -> Result<EditCommand> {
        let (Some(first), Some(second)) = (self.record, next.record) else {
            return Err(SpliceError::Consistency(format!(
                "cannot merge '{}' into an unapplied command",
                next.label
            )));
        };
        let affected = affected_ranges(&first.before, &second.after);
        Ok(EditCommand {
            label: next.label,
            op: next.op,
            state: CommandState::Applied,
            record: Some(UndoRecord {
                before: first.before,
                after: second.after,
                affected,
            }),
        })
    }

    /// Mark as evicted and free the snapshots.
    pub fn discard(&mut self) {
        self.state = CommandState::Discarded;
        self.record = None;
    }
}

// ── Tests ───────────────────────────────────────────────────────
