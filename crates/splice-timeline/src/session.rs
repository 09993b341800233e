//! Edit session: the single writer of a timeline.
//!
//! The session owns the working timeline and its history. After every
//! successful edit, undo or redo it publishes the new timeline to
//! [`SnapshotReader`]s and sends a [`ChangeNotice`] to subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use num_rational::Rational64;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use splice_core::limits::DEFAULT_HISTORY_DEPTH;
use splice_core::{Frame, Profile, Result, SpliceError, TimeRange};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clip::{Clip, FadeEdge, ItemId, SourceRef, TrackId};
use crate::edit::{AffectedRange, EditCommand, EditOp};
use crate::filter::{FilterAttachment, FilterOwner, ParamValue};
use crate::history::{EditHandle, HistoryStack, HistoryStep};
use crate::timeline::Timeline;
use crate::track::{Track, TrackFlag};

// ── Configuration ───────────────────────────────────────────────

/// Session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of undo steps kept.
    pub history_depth: usize,
    /// Coalesce repeated trims of the same clip edge into one undo step.
    pub merge_trims: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            merge_trims: true,
        }
    }
}

impl SessionConfig {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| SpliceError::Serialization(format!("Invalid session config: {e}")))
    }
}

// ── Notifications ───────────────────────────────────────────────

/// What produced a new revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Applied,
    Undone,
    Redone,
    Reloaded,
}

/// Sent to subscribers after every committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub revision: u64,
    pub kind: ChangeKind,
    pub label: String,
    pub affected: SmallVec<[AffectedRange; 2]>,
}

// ── Snapshot handoff ────────────────────────────────────────────

#[derive(Debug)]
struct Published {
    revision: u64,
    timeline: Arc<Timeline>,
}

/// Read access to the latest committed timeline from any thread.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    slot: Arc<RwLock<Published>>,
}

impl SnapshotReader {
    /// Latest committed timeline.
    pub fn latest(&self) -> Arc<Timeline> {
        Arc::clone(&self.slot.read().timeline)
    }

    pub fn revision(&self) -> u64 {
        self.slot.read().revision
    }

    /// Latest timeline together with its revision.
    pub fn snapshot(&self) -> (u64, Arc<Timeline>) {
        let published = self.slot.read();
        (published.revision, Arc::clone(&published.timeline))
    }
}

// ── Media sources ───────────────────────────────────────────────

/// Lookup of media sources known to the application.
pub trait SourceRegistry: Send + Sync {
    fn lookup(&self, id: &str) -> Option<SourceRef>;
}

/// In-memory source registry.
#[derive(Debug, Clone, Default)]
pub struct MediaSources {
    sources: HashMap<String, SourceRef>,
}

impl MediaSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: SourceRef) {
        self.sources.insert(source.id.clone(), source);
    }

    pub fn remove(&mut self, id: &str) -> Option<SourceRef> {
        self.sources.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceRegistry for MediaSources {
    fn lookup(&self, id: &str) -> Option<SourceRef> {
        self.sources.get(id).cloned()
    }
}

// ── Session ─────────────────────────────────────────────────────

/// Owns a timeline and applies every change to it.
pub struct EditSession {
    timeline: Arc<Timeline>,
    history: HistoryStack,
    published: Arc<RwLock<Published>>,
    subscribers: Vec<Sender<ChangeNotice>>,
    revision: u64,
    needs_reload: bool,
    config: SessionConfig,
    sources: Option<Arc<dyn SourceRegistry>>,
}

impl EditSession {
    pub fn new(timeline: Timeline) -> Self {
        Self::with_config(timeline, SessionConfig::default())
    }

    pub fn with_config(timeline: Timeline, config: SessionConfig) -> Self {
        let timeline = Arc::new(timeline);
        let published = Arc::new(RwLock::new(Published {
            revision: 0,
            timeline: Arc::clone(&timeline),
        }));
        info!(timeline = %timeline.name, depth = config.history_depth, "edit session opened");
        Self {
            timeline,
            history: HistoryStack::new(config.history_depth)
                .with_merge_trims(config.merge_trims),
            published,
            subscribers: Vec::new(),
            revision: 0,
            needs_reload: false,
            config,
            sources: None,
        }
    }

    /// Builder: check newly placed clips against `registry`.
    pub fn with_sources(mut self, registry: Arc<dyn SourceRegistry>) -> Self {
        self.sources = Some(registry);
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    /// A reader that always sees the latest committed timeline.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            slot: Arc::clone(&self.published),
        }
    }

    /// Receive a [`ChangeNotice`] for every later revision.
    pub fn subscribe(&mut self) -> Receiver<ChangeNotice> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    // ── Core ────────────────────────────────────────────────────

    /// Apply and record an arbitrary op.
    pub fn execute(&mut self, op: EditOp) -> Result<EditHandle> {
        self.execute_command(EditCommand::new(op))
    }

    /// Apply and record a prepared command.
    pub fn execute_command(&mut self, command: EditCommand) -> Result<EditHandle> {
        self.ensure_healthy()?;
        self.check_sources(command.op())?;
        let result = self.history.push(command, &self.timeline);
        let step = self.track_fault(result)?;
        let handle = step.handle;
        self.commit(step, ChangeKind::Applied);
        Ok(handle)
    }

    pub fn undo(&mut self) -> Result<EditHandle> {
        self.ensure_healthy()?;
        let result = self.history.undo(&self.timeline);
        let step = self.track_fault(result)?;
        let handle = step.handle;
        self.commit(step, ChangeKind::Undone);
        Ok(handle)
    }

    pub fn redo(&mut self) -> Result<EditHandle> {
        self.ensure_healthy()?;
        let result = self.history.redo(&self.timeline);
        let step = self.track_fault(result)?;
        let handle = step.handle;
        self.commit(step, ChangeKind::Redone);
        Ok(handle)
    }

    /// Undo back to the state before `handle` was applied.
    pub fn undo_to(&mut self, handle: EditHandle) -> Result<EditHandle> {
        self.ensure_healthy()?;
        let result = self.history.undo_to(handle, &self.timeline);
        let step = self.track_fault(result)?;
        self.commit(step, ChangeKind::Undone);
        Ok(handle)
    }

    /// Replace the document (typically with the last saved project) and
    /// start over with empty history.
    pub fn reload(&mut self, timeline: Timeline) -> Result<()> {
        timeline.validate()?;
        self.history.clear();
        self.needs_reload = false;
        let affected = [AffectedRange {
            track: None,
            range: TimeRange::new(0, self.timeline.duration().max(timeline.duration())),
        }]
        .into_iter()
        .collect();
        info!(timeline = %timeline.name, "session reloaded");
        self.publish(
            timeline,
            ChangeNotice {
                revision: 0,
                kind: ChangeKind::Reloaded,
                label: "Reload".to_string(),
                affected,
            },
        );
        Ok(())
    }

    /// Clips whose source the registry does not know. The clips stay in place.
    pub fn offline_clips(
        &self,
        registry: &dyn SourceRegistry,
    ) -> Vec<(TrackId, ItemId, SpliceError)> {
        self.timeline
            .clips()
            .filter(|(_, clip)| registry.lookup(&clip.source.id).is_none())
            .map(|(track, clip)| {
                (
                    track,
                    clip.id,
                    SpliceError::SourceUnavailable(clip.source.id.clone()),
                )
            })
            .collect()
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.needs_reload {
            Err(SpliceError::NeedsReload)
        } else {
            Ok(())
        }
    }

    fn track_fault<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                error!(error = %e, "session disabled until reload");
                self.needs_reload = true;
            } else {
                debug!(error = %e, "edit rejected");
            }
        }
        result
    }

    fn check_sources(&self, op: &EditOp) -> Result<()> {
        let (Some(registry), Some(clip)) = (&self.sources, placed_clip(op)) else {
            return Ok(());
        };
        if registry.lookup(&clip.source.id).is_none() {
            warn!(source = %clip.source.id, "clip source is offline");
            return Err(SpliceError::SourceUnavailable(clip.source.id.clone()));
        }
        Ok(())
    }

    fn commit(&mut self, step: HistoryStep, kind: ChangeKind) {
        let notice = ChangeNotice {
            revision: 0,
            kind,
            label: step.label,
            affected: step.affected,
        };
        self.publish(step.timeline, notice);
    }

    fn publish(&mut self, timeline: Timeline, mut notice: ChangeNotice) {
        self.revision += 1;
        notice.revision = self.revision;
        self.timeline = Arc::new(timeline);
        {
            let mut slot = self.published.write();
            slot.revision = self.revision;
            slot.timeline = Arc::clone(&self.timeline);
        }
        debug!(revision = self.revision, kind = ?notice.kind, label = %notice.label, "published");
        self.subscribers
            .retain(|tx| tx.send(notice.clone()).is_ok());
    }

    // ── Intent API ──────────────────────────────────────────────

    pub fn append(&mut self, track: TrackId, clip: Clip) -> Result<EditHandle> {
        self.execute(EditOp::Append { track, clip })
    }

    pub fn insert(&mut self, track: TrackId, clip: Clip, at: Frame) -> Result<EditHandle> {
        self.execute(EditOp::Insert {
            track,
            clip,
            at,
            split_id: Uuid::new_v4(),
        })
    }

    pub fn overwrite(&mut self, track: TrackId, clip: Clip, at: Frame) -> Result<EditHandle> {
        self.execute(EditOp::Overwrite {
            track,
            clip,
            at,
            split_id: Uuid::new_v4(),
        })
    }

    pub fn lift(&mut self, track: TrackId, range: TimeRange) -> Result<EditHandle> {
        self.execute(EditOp::Lift {
            track,
            range,
            split_id: Uuid::new_v4(),
        })
    }

    pub fn ripple_delete(&mut self, track: TrackId, range: TimeRange) -> Result<EditHandle> {
        self.execute(EditOp::RippleDelete {
            track,
            range,
            split_id: Uuid::new_v4(),
        })
    }

    pub fn trim_in(
        &mut self,
        track: TrackId,
        item: ItemId,
        new_start: Frame,
        ripple: bool,
    ) -> Result<EditHandle> {
        self.execute(EditOp::TrimIn {
            track,
            item,
            new_start,
            ripple,
        })
    }

    pub fn trim_out(
        &mut self,
        track: TrackId,
        item: ItemId,
        new_end: Frame,
        ripple: bool,
    ) -> Result<EditHandle> {
        self.execute(EditOp::TrimOut {
            track,
            item,
            new_end,
            ripple,
        })
    }

    /// Split a clip at timeline frame `at`; the right half gets a new id.
    pub fn split(&mut self, track: TrackId, item: ItemId, at: Frame) -> Result<EditHandle> {
        self.execute(EditOp::Split {
            track,
            item,
            at,
            right_id: Uuid::new_v4(),
        })
    }

    pub fn add_transition(
        &mut self,
        track: TrackId,
        left: ItemId,
        right: ItemId,
        duration: Frame,
        type_id: impl Into<String>,
    ) -> Result<EditHandle> {
        self.execute(EditOp::AddTransition {
            track,
            left,
            right,
            duration,
            transition_id: Uuid::new_v4(),
            type_id: type_id.into(),
        })
    }

    pub fn remove_transition(&mut self, track: TrackId, item: ItemId) -> Result<EditHandle> {
        self.execute(EditOp::RemoveTransition { track, item })
    }

    pub fn move_clip(
        &mut self,
        from: TrackId,
        item: ItemId,
        to: TrackId,
        position: Frame,
    ) -> Result<EditHandle> {
        self.execute(EditOp::MoveClip {
            from,
            item,
            to,
            position,
        })
    }

    pub fn set_fade(
        &mut self,
        track: TrackId,
        item: ItemId,
        edge: FadeEdge,
        length: Frame,
    ) -> Result<EditHandle> {
        self.execute(EditOp::SetFade {
            track,
            item,
            edge,
            length,
        })
    }

    pub fn set_speed(
        &mut self,
        track: TrackId,
        item: ItemId,
        speed: Rational64,
    ) -> Result<EditHandle> {
        self.execute(EditOp::SetSpeed { track, item, speed })
    }

    pub fn set_track_flag(&mut self, track: TrackId, flag: TrackFlag) -> Result<EditHandle> {
        self.execute(EditOp::SetTrackFlag { track, flag })
    }

    /// Add a track at `index` (top of the stack when `None`).
    pub fn add_track(&mut self, track: Track, index: Option<usize>) -> Result<EditHandle> {
        self.execute(EditOp::AddTrack { track, index })
    }

    pub fn remove_track(&mut self, track: TrackId) -> Result<EditHandle> {
        self.execute(EditOp::RemoveTrack { track })
    }

    pub fn set_profile(&mut self, profile: Profile) -> Result<EditHandle> {
        self.execute(EditOp::SetProfile { profile })
    }

    pub fn attach_filter(
        &mut self,
        owner: FilterOwner,
        filter: FilterAttachment,
        index: Option<usize>,
    ) -> Result<EditHandle> {
        self.execute(EditOp::AttachFilter {
            owner,
            filter,
            index,
        })
    }

    pub fn detach_filter(&mut self, owner: FilterOwner, filter: Uuid) -> Result<EditHandle> {
        self.execute(EditOp::DetachFilter { owner, filter })
    }

    pub fn move_filter(
        &mut self,
        owner: FilterOwner,
        filter: Uuid,
        to_index: usize,
    ) -> Result<EditHandle> {
        self.execute(EditOp::MoveFilter {
            owner,
            filter,
            to_index,
        })
    }

    pub fn set_parameter(
        &mut self,
        owner: FilterOwner,
        filter: Uuid,
        name: impl Into<String>,
        value: ParamValue,
    ) -> Result<EditHandle> {
        self.execute(EditOp::SetParameter {
            owner,
            filter,
            name: name.into(),
            value,
        })
    }

    pub fn set_keyframe(
        &mut self,
        owner: FilterOwner,
        filter: Uuid,
        name: impl Into<String>,
        offset: Frame,
        value: f64,
    ) -> Result<EditHandle> {
        self.execute(EditOp::SetKeyframe {
            owner,
            filter,
            name: name.into(),
            offset,
            value,
        })
    }

    pub fn remove_keyframe(
        &mut self,
        owner: FilterOwner,
        filter: Uuid,
        name: impl Into<String>,
        offset: Frame,
    ) -> Result<EditHandle> {
        self.execute(EditOp::RemoveKeyframe {
            owner,
            filter,
            name: name.into(),
            offset,
        })
    }

    pub fn set_keyframes_enabled(
        &mut self,
        owner: FilterOwner,
        filter: Uuid,
        enabled: bool,
        playhead: Frame,
    ) -> Result<EditHandle> {
        self.execute(EditOp::SetKeyframesEnabled {
            owner,
            filter,
            enabled,
            playhead,
        })
    }
}

/// Clip an op brings onto the timeline from outside, if any.
fn placed_clip(op: &EditOp) -> Option<&Clip> {
    match op {
        EditOp::Append { clip, .. }
        | EditOp::Insert { clip, .. }
        | EditOp::Overwrite { clip, .. } => Some(clip),
        _ => None,
    }
}

// ── Tests ───────────────────────────────────────────────────────
