//! Splice Timeline - the edit engine's document model
//!
//! Implements the timeline structure for video editing:
//! - Timelines containing tracks of clips and transitions
//! - Filter attachments with keyframed parameters
//! - Track edit operations (insert, overwrite, lift, ripple delete, trims, split)
//! - Reversible edit commands with bounded undo/redo history
//! - Edit sessions publishing committed snapshots to readers
//! - Background render jobs over immutable snapshots

pub mod clip;
pub mod edit;
pub mod filter;
pub mod history;
pub mod job;
pub mod serialization;
pub mod session;
pub mod timeline;
pub mod track;
pub mod transition;

pub use clip::{Clip, FadeEdge, ItemId, SourceRef, TrackId};
pub use edit::{AffectedRange, CommandState, EditCommand, EditOp};
pub use filter::{FilterAttachment, FilterOwner, FilterScope, ParamValue, Parameter};
pub use history::{EditHandle, HistoryStack, HistoryStep};
pub use job::{JobEvent, JobId, JobRunner, JobRunnerConfig, JobState, JobWorker, OutputSpec};
pub use serialization::ProjectFile;
pub use session::{
    ChangeKind, ChangeNotice, EditSession, MediaSources, SessionConfig, SnapshotReader,
    SourceRegistry,
};
pub use timeline::Timeline;
pub use track::{BlendMode, Track, TrackFlag, TrackItem, TrackKind};
pub use transition::Transition;
