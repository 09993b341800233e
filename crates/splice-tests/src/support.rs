//! Shared fixtures for the integration tests.

use splice_core::Frame;
use splice_timeline::{Clip, SourceRef, TrackId, TrackItem, Timeline};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once; output is controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A clip of `len` frames cut from the middle of a 1000-frame source, so
/// both edges have 100+ frames of headroom.
pub fn clip(name: &str, len: Frame) -> Clip {
    Clip::with_range(name, SourceRef::new(name, 1000), 100, 100 + len).unwrap()
}

/// Id of the first video track.
pub fn video(timeline: &Timeline) -> TrackId {
    timeline.tracks[0].id
}

/// `(start, end)` of every item on a track, transitions included.
pub fn layout(timeline: &Timeline, track: usize) -> Vec<(Frame, Frame)> {
    timeline.tracks[track]
        .items
        .iter()
        .map(|item| (item.start(), item.end()))
        .collect()
}

/// Item kinds on a track as `'C'` for clips and `'T'` for transitions.
pub fn kinds(timeline: &Timeline, track: usize) -> String {
    timeline.tracks[track]
        .items
        .iter()
        .map(|item| match item {
            TrackItem::Clip(_) => 'C',
            TrackItem::Transition(_) => 'T',
        })
        .collect()
}
