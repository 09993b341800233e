//! Error types for Splice.

use thiserror::Error;

/// Main error type for edit engine operations.
///
/// Everything except [`SpliceError::Consistency`] and
/// [`SpliceError::NeedsReload`] is recoverable: the rejected operation left
/// the document untouched and the message can be shown to the user as-is.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("Range conflict: {0}")]
    RangeConflict(String),

    #[error("Track is locked: {0}")]
    TrackLocked(String),

    #[error("Insufficient trim: {0}")]
    InsufficientTrim(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate filter: {0}")]
    DuplicateFilter(String),

    #[error("Internal consistency failure: {0}")]
    Consistency(String),

    #[error("Session needs to be reloaded from the last saved project")]
    NeedsReload,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpliceError {
    /// Whether this error means the session can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency(_) | Self::NeedsReload)
    }
}

/// Result type alias for Splice operations.
pub type Result<T> = std::result::Result<T, SpliceError>;
