//! Splice Core - Foundation types for the edit engine
//!
//! This crate provides the primitives shared by the timeline model and the
//! session layer:
//! - Frame-accurate time (Frame, FrameRate, TimeRange, timecode)
//! - Video profile (resolution, rate, aspect, color space)
//! - Keyframe curves and their interpolation
//! - The engine-wide error type

pub mod error;
pub mod keyframe;
pub mod profile;
pub mod time;

pub use error::{Result, SpliceError};
pub use keyframe::{Interpolation, Keyframe, KeyframeTrack};
pub use profile::{ColorSpace, Profile, ScanMode};
pub use time::{Frame, FrameRate, TimeRange};

/// Limits applied to edit operations.
pub mod limits {
    /// Shortest clip an edit may leave behind, in frames.
    pub const MIN_CLIP_LENGTH: i64 = 1;

    /// Default number of commands kept on the undo stack.
    pub const DEFAULT_HISTORY_DEPTH: usize = 200;

    /// Frames between progress reports from background jobs.
    pub const JOB_PROGRESS_INTERVAL: u64 = 10;
}
