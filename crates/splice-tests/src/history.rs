//! Integration tests for undo/redo through an edit session.

use splice_core::{SpliceError, TimeRange};
use splice_timeline::{
    EditSession, FilterAttachment, FilterOwner, FilterScope, ParamValue, SessionConfig, Timeline,
    Track, TrackFlag,
};

use crate::support::{clip, init_tracing, layout, video};

fn session() -> EditSession {
    init_tracing();
    EditSession::new(Timeline::default())
}

#[test]
fn undo_everything_restores_initial_timeline() {
    let mut session = session();
    let initial = session.timeline().clone();
    let track = video(&initial);

    session.append(track, clip("a", 60)).unwrap();
    session.append(track, clip("b", 40)).unwrap();
    session.insert(track, clip("c", 10), 30).unwrap();
    let b = session.timeline().tracks[0].items[3].id();
    session.trim_out(track, b, 100, false).unwrap();
    let a = session.timeline().tracks[0].items[0].id();
    session.split(track, a, 10).unwrap();
    session
        .add_track(Track::new_audio("A2"), None)
        .unwrap();
    session
        .attach_filter(
            FilterOwner::Track(track),
            FilterAttachment::new("blur", FilterScope::Track)
                .with_parameter("radius", ParamValue::Number(2.0)),
            None,
        )
        .unwrap();
    session.set_track_flag(track, TrackFlag::Name("Main".into())).unwrap();

    while session.history().can_undo() {
        session.undo().unwrap();
    }
    assert_eq!(*session.timeline(), initial);
    assert!(matches!(session.undo(), Err(SpliceError::NothingToUndo)));
}

#[test]
fn redo_everything_reaches_final_timeline() {
    let mut session = session();
    let track = video(session.timeline());
    session.append(track, clip("a", 60)).unwrap();
    session.append(track, clip("b", 40)).unwrap();
    session
        .ripple_delete(track, TimeRange::new(20, 50))
        .unwrap();
    let edited = session.timeline().clone();

    for _ in 0..3 {
        session.undo().unwrap();
    }
    for _ in 0..3 {
        session.redo().unwrap();
    }
    assert_eq!(*session.timeline(), edited);
    assert!(matches!(session.redo(), Err(SpliceError::NothingToRedo)));
}

#[test]
fn push_after_three_undos_discards_redo_branch() {
    let mut session = session();
    let track = video(session.timeline());
    for name in ["a", "b", "c", "d", "e"] {
        session.append(track, clip(name, 10)).unwrap();
    }
    for _ in 0..3 {
        session.undo().unwrap();
    }
    assert_eq!(session.history().redo_count(), 3);

    session.append(track, clip("f", 10)).unwrap();
    assert_eq!(session.history().redo_count(), 0);
    assert!(matches!(session.redo(), Err(SpliceError::NothingToRedo)));
    assert_eq!(layout(session.timeline(), 0), [(0, 10), (10, 20), (20, 30)]);
}

#[test]
fn repeated_trims_undo_as_one_step() {
    let mut session = session();
    let track = video(session.timeline());
    session.append(track, clip("a", 50)).unwrap();
    session.append(track, clip("b", 50)).unwrap();
    let after_appends = session.timeline().clone();
    let b = session.timeline().tracks[0].items[1].id();

    for end in [110, 120, 130, 125] {
        session.trim_out(track, b, end, false).unwrap();
    }
    assert_eq!(session.history().undo_count(), 3);
    assert_eq!(session.history().undo_label(), Some("Trim out"));

    session.undo().unwrap();
    assert_eq!(*session.timeline(), after_appends);
}

#[test]
fn trim_merging_can_be_turned_off() {
    init_tracing();
    let config = SessionConfig::from_json(br#"{ "merge_trims": false }"#).unwrap();
    let mut session = EditSession::with_config(Timeline::default(), config);
    let track = video(session.timeline());
    session.append(track, clip("a", 50)).unwrap();
    let a = session.timeline().tracks[0].items[0].id();
    for end in [45, 40, 35] {
        session.trim_out(track, a, end, false).unwrap();
    }
    assert_eq!(session.history().undo_count(), 4);
}

#[test]
fn history_depth_limits_undo() {
    init_tracing();
    let config = SessionConfig {
        history_depth: 2,
        ..SessionConfig::default()
    };
    let mut session = EditSession::with_config(Timeline::default(), config);
    let track = video(session.timeline());
    for name in ["a", "b", "c"] {
        session.append(track, clip(name, 10)).unwrap();
    }
    session.undo().unwrap();
    session.undo().unwrap();
    assert!(matches!(session.undo(), Err(SpliceError::NothingToUndo)));
    assert_eq!(layout(session.timeline(), 0), [(0, 10)]);
}

#[test]
fn undo_of_removed_track_brings_clips_back() {
    let mut session = session();
    let v2 = Track::new_video("V2");
    let v2_id = v2.id;
    session.add_track(v2, None).unwrap();
    session.append(v2_id, clip("a", 30)).unwrap();
    let with_clip = session.timeline().clone();

    session.remove_track(v2_id).unwrap();
    assert!(session.timeline().track(v2_id).is_err());
    session.undo().unwrap();
    assert_eq!(*session.timeline(), with_clip);
}

#[test]
fn failed_edit_is_not_undoable() {
    let mut session = session();
    let track = video(session.timeline());
    session.append(track, clip("a", 50)).unwrap();
    let item = session.timeline().tracks[0].items[0].id();

    assert!(session.split(track, item, 0).is_err());
    assert!(session.trim_in(track, uuid::Uuid::new_v4(), 0, false).is_err());
    assert_eq!(session.history().undo_count(), 1);
    assert_eq!(session.history().undo_label(), Some("Append 'a'"));
}
