//! Integration tests for track edits driven through an edit session.

use num_rational::Rational64;
use splice_core::{FrameRate, Interpolation, KeyframeTrack, Profile, SpliceError, TimeRange};
use splice_timeline::{
    EditSession, FadeEdge, FilterAttachment, FilterOwner, FilterScope, ParamValue, Timeline,
    Track, TrackFlag, TrackItem,
};

use crate::support::{clip, init_tracing, kinds, layout, video};

fn session_with(clips: &[(&str, i64)]) -> EditSession {
    init_tracing();
    let mut session = EditSession::new(Timeline::default());
    let track = video(session.timeline());
    for (name, len) in clips {
        session.append(track, clip(name, *len)).unwrap();
    }
    session
}

fn item_id(session: &EditSession, index: usize) -> uuid::Uuid {
    session.timeline().tracks[0].items[index].id()
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn insert_splits_straddled_clip_and_shifts_tail() {
    let mut session = session_with(&[("a", 100)]);
    let track = video(session.timeline());

    session.insert(track, clip("b", 20), 30).unwrap();

    assert_eq!(layout(session.timeline(), 0), [(0, 30), (30, 50), (50, 110)]);
    let items = &session.timeline().tracks[0].items;
    let left = items[0].as_clip().unwrap();
    let right = items[2].as_clip().unwrap();
    assert_eq!((left.source_in, left.source_out), (100, 130));
    assert_eq!((right.source_in, right.source_out), (130, 200));
    assert_eq!(items[1].as_clip().unwrap().name, "b");
}

#[test]
fn split_divides_clip_and_its_keyframes() {
    let mut session = session_with(&[("a", 100)]);
    let track = video(session.timeline());
    let item = item_id(&session, 0);

    let owner = FilterOwner::Item { track, item };
    let opacity = FilterAttachment::new("opacity", FilterScope::Clip)
        .with_parameter("level", ParamValue::Number(1.0));
    let fid = opacity.id;
    session.attach_filter(owner, opacity, None).unwrap();
    session.set_keyframe(owner, fid, "level", 0, 0.0).unwrap();
    session.set_keyframe(owner, fid, "level", 64, 64.0).unwrap();

    session.split(track, item, 40).unwrap();

    let timeline = session.timeline();
    assert_eq!(layout(timeline, 0), [(0, 40), (40, 100)]);
    let left = timeline.tracks[0].items[0].as_clip().unwrap();
    let right = timeline.tracks[0].items[1].as_clip().unwrap();
    assert_eq!(left.id, item);
    assert_ne!(right.id, item);

    // The curve is continuous across the cut.
    let level = |c: &splice_timeline::Clip, offset| {
        c.filters[0].value_at("level", offset).and_then(|v| v.as_number())
    };
    assert_eq!(level(left, 0), Some(0.0));
    assert_eq!(level(left, 39), Some(39.0));
    assert_eq!(level(right, 0), Some(40.0));
    assert_eq!(level(right, 24), Some(64.0));
}

#[test]
fn add_transition_shortens_both_neighbours() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let track = video(session.timeline());
    let (left, right) = (item_id(&session, 0), item_id(&session, 1));

    session
        .add_transition(track, left, right, 10, "dissolve")
        .unwrap();

    let timeline = session.timeline();
    assert_eq!(layout(timeline, 0), [(0, 45), (45, 55), (55, 100)]);
    assert_eq!(kinds(timeline, 0), "CTC");
    let transition = timeline.tracks[0].items[1].as_transition().unwrap();
    assert_eq!(transition.cut(), 50);
    assert_eq!(transition.type_id, "dissolve");

    // Removing it restores the original cut.
    let tid = transition.id;
    session.remove_transition(track, tid).unwrap();
    assert_eq!(layout(session.timeline(), 0), [(0, 50), (50, 100)]);
}

#[test]
fn insert_on_transition_is_rejected() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let track = video(session.timeline());
    let (left, right) = (item_id(&session, 0), item_id(&session, 1));
    session
        .add_transition(track, left, right, 10, "dissolve")
        .unwrap();
    let before = session.timeline().clone();

    for at in [45, 50, 55] {
        let err = session.insert(track, clip("x", 5), at).unwrap_err();
        assert!(matches!(err, SpliceError::RangeConflict(_)), "at {at}");
    }
    assert_eq!(*session.timeline(), before);
}

#[test]
fn trim_in_beyond_neighbour_conflicts_and_leaves_track_unchanged() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let track = video(session.timeline());
    let right = item_id(&session, 1);
    let before = session.timeline().clone();

    let err = session.trim_in(track, right, 40, false).unwrap_err();
    assert!(matches!(err, SpliceError::RangeConflict(_)));
    assert_eq!(*session.timeline(), before);
    assert_eq!(session.history().undo_count(), 2);
}

#[test]
fn trims_respect_source_headroom() {
    let mut session = session_with(&[("a", 50)]);
    let track = video(session.timeline());
    let item = item_id(&session, 0);

    // The source runs out 850 frames after the out point.
    session.trim_out(track, item, 900, false).unwrap();
    let err = session.trim_out(track, item, 901, false).unwrap_err();
    assert!(matches!(err, SpliceError::InsufficientTrim(_)));
    let err = session.trim_out(track, item, 0, false).unwrap_err();
    assert!(matches!(err, SpliceError::InvalidRange(_)));
}

#[test]
fn ripple_trim_moves_later_items() {
    let mut session = session_with(&[("a", 50), ("b", 50), ("c", 50)]);
    let track = video(session.timeline());
    let first = item_id(&session, 0);

    session.trim_out(track, first, 30, true).unwrap();
    assert_eq!(layout(session.timeline(), 0), [(0, 30), (30, 80), (80, 130)]);

    // Ripple trim-in keeps the start and pulls the tail in.
    let second = item_id(&session, 1);
    session.trim_in(track, second, 40, true).unwrap();
    assert_eq!(layout(session.timeline(), 0), [(0, 30), (30, 70), (70, 120)]);
    let b = session.timeline().tracks[0].items[1].as_clip().unwrap();
    assert_eq!(b.source_in, 110);
}

#[test]
fn overwrite_and_lift_leave_later_items_in_place() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let track = video(session.timeline());

    session.overwrite(track, clip("x", 20), 40).unwrap();
    assert_eq!(layout(session.timeline(), 0), [(0, 40), (40, 60), (60, 100)]);

    session.lift(track, TimeRange::new(10, 20)).unwrap();
    assert_eq!(
        layout(session.timeline(), 0),
        [(0, 10), (30, 40), (40, 60), (60, 100)]
    );

    session.ripple_delete(track, TimeRange::new(10, 20)).unwrap();
    assert_eq!(
        layout(session.timeline(), 0),
        [(0, 10), (10, 20), (20, 40), (40, 80)]
    );
}

#[test]
fn ripple_delete_of_insert_restores_track() {
    let mut session = session_with(&[("a", 60), ("b", 40)]);
    let track = video(session.timeline());
    let before = session.timeline().tracks[0].clone();

    session.insert(track, clip("x", 15), 25).unwrap();
    session
        .ripple_delete(track, TimeRange::new(25, 15))
        .unwrap();

    assert_eq!(session.timeline().tracks[0], before);
}

#[test]
fn locked_track_rejects_structural_edits() {
    let mut session = session_with(&[("a", 50)]);
    let track = video(session.timeline());
    let item = item_id(&session, 0);
    session
        .set_track_flag(track, TrackFlag::Locked(true))
        .unwrap();
    let before = session.timeline().clone();

    let results = [
        session.append(track, clip("x", 5)),
        session.insert(track, clip("x", 5), 10),
        session.overwrite(track, clip("x", 5), 10),
        session.lift(track, TimeRange::new(0, 10)),
        session.ripple_delete(track, TimeRange::new(0, 10)),
        session.trim_in(track, item, 10, false),
        session.trim_out(track, item, 40, false),
        session.split(track, item, 25),
        session.set_fade(track, item, FadeEdge::In, 5),
        session.set_speed(track, item, Rational64::new(2, 1)),
    ];
    for result in results {
        assert!(matches!(result, Err(SpliceError::TrackLocked(_))));
    }
    assert_eq!(*session.timeline(), before);

    // Metadata stays editable.
    session.set_track_flag(track, TrackFlag::Muted(true)).unwrap();
    assert!(session.timeline().tracks[0].muted);
}

#[test]
fn speed_change_resizes_clip() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let track = video(session.timeline());
    let (first, second) = (item_id(&session, 0), item_id(&session, 1));

    session
        .set_speed(track, second, Rational64::new(2, 1))
        .unwrap();
    assert_eq!(layout(session.timeline(), 0), [(0, 50), (50, 75)]);

    let err = session
        .set_speed(track, first, Rational64::new(1, 2))
        .unwrap_err();
    assert!(matches!(err, SpliceError::RangeConflict(_)));
    let err = session
        .set_speed(track, first, Rational64::from_integer(0))
        .unwrap_err();
    assert!(matches!(err, SpliceError::InvalidRange(_)));
}

#[test]
fn move_clip_across_tracks() {
    let mut session = session_with(&[("a", 50), ("b", 50)]);
    let v1 = video(session.timeline());
    let v2 = Track::new_video("V2");
    let v2_id = v2.id;
    session.add_track(v2, Some(1)).unwrap();
    let item = item_id(&session, 1);

    session.move_clip(v1, item, v2_id, 200).unwrap();
    let timeline = session.timeline();
    assert_eq!(layout(timeline, 0), [(0, 50)]);
    assert_eq!(timeline.tracks[1].items[0].range(), TimeRange::new(200, 50));

    let audio = timeline.tracks[2].id;
    let err = session.move_clip(v2_id, item, audio, 0).unwrap_err();
    assert!(matches!(err, SpliceError::RangeConflict(_)));
}

#[test]
fn timeline_filters_and_unique_rule() {
    let mut session = session_with(&[("a", 50)]);
    let grade = FilterAttachment::new("grade", FilterScope::Timeline).unique();
    session
        .attach_filter(FilterOwner::Timeline, grade, None)
        .unwrap();

    let again = FilterAttachment::new("grade", FilterScope::Timeline);
    let err = session
        .attach_filter(FilterOwner::Timeline, again, None)
        .unwrap_err();
    assert!(matches!(err, SpliceError::DuplicateFilter(_)));
    assert_eq!(session.timeline().filters.len(), 1);
}

#[test]
fn disabling_keyframes_keeps_value_at_playhead() {
    let mut session = session_with(&[("a", 100)]);
    let track = video(session.timeline());
    let owner = FilterOwner::Track(track);
    let volume = FilterAttachment::new("volume", FilterScope::Track)
        .with_parameter("gain", ParamValue::Number(1.0));
    let fid = volume.id;
    session.attach_filter(owner, volume, None).unwrap();
    session.set_keyframe(owner, fid, "gain", 0, 0.0).unwrap();
    session.set_keyframe(owner, fid, "gain", 100, 1.0).unwrap();

    session
        .set_keyframes_enabled(owner, fid, false, 25)
        .unwrap();
    let filter = &session.timeline().tracks[0].filters[0];
    assert!(!filter.keyframes_enabled);
    assert_eq!(filter.value_at("gain", 90), Some(ParamValue::Number(0.25)));

    session.undo().unwrap();
    let filter = &session.timeline().tracks[0].filters[0];
    assert_eq!(filter.value_at("gain", 90), Some(ParamValue::Number(0.9)));
}

#[test]
fn keyframes_evaluate_exactly_at_keys() {
    for interpolation in [
        Interpolation::Discrete,
        Interpolation::Linear,
        Interpolation::Smooth,
    ] {
        let keys = [(0, 0.3), (7, -2.5), (19, 11.0), (40, 0.125)];
        let track = KeyframeTrack::from_keys(interpolation, keys);
        for (offset, value) in keys {
            assert_eq!(track.evaluate(offset), Some(value), "{interpolation:?}");
        }
        assert_eq!(track.evaluate(-10), Some(0.3));
        assert_eq!(track.evaluate(1000), Some(0.125));
    }
}

#[test]
fn duration_formats_as_timecode() {
    let mut session = session_with(&[("a", 100), ("b", 50)]);
    session
        .set_profile(Profile::new(1920, 1080, FrameRate::FPS_24))
        .unwrap();
    let timeline = session.timeline();
    let rate = timeline.profile.frame_rate;
    assert_eq!(rate.to_timecode(timeline.duration()), "00:00:06:06");
    assert_eq!(timeline.next_edit(0), Some(100));
    assert_eq!(timeline.previous_edit(120), Some(100));
}

#[test]
fn fades_are_bounded_by_clip_length() {
    let mut session = session_with(&[("a", 50)]);
    let track = video(session.timeline());
    let item = item_id(&session, 0);

    session.set_fade(track, item, FadeEdge::Out, 12).unwrap();
    let TrackItem::Clip(c) = &session.timeline().tracks[0].items[0] else {
        panic!("expected clip");
    };
    assert_eq!(c.fade_out, 12);
    let err = session.set_fade(track, item, FadeEdge::In, 51).unwrap_err();
    assert!(matches!(err, SpliceError::InvalidRange(_)));
}
