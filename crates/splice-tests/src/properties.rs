//! Property tests over random edit sequences.

use num_rational::Rational64;
use proptest::prelude::*;
use splice_core::{Frame, SpliceError, TimeRange};
use splice_timeline::{
    Clip, EditCommand, EditOp, EditSession, FadeEdge, FilterAttachment, FilterScope, ParamValue,
    SourceRef, Timeline, TrackItem,
};
use uuid::Uuid;

use crate::support::{init_tracing, video};

/// Speed and animation of a generated clip.
#[derive(Debug, Clone, Copy)]
struct Shape {
    speed: (i64, i64),
    keyed: bool,
}

#[derive(Debug, Clone)]
enum Action {
    Append { len: Frame, shape: Shape },
    Insert { at: Frame, len: Frame, shape: Shape },
    Overwrite { at: Frame, len: Frame, shape: Shape },
    Lift { start: Frame, len: Frame },
    RippleDelete { start: Frame, len: Frame },
    TrimIn { pick: usize, delta: Frame, ripple: bool },
    TrimOut { pick: usize, delta: Frame, ripple: bool },
    Split { pick: usize, offset: Frame },
    Transition { pick: usize, duration: Frame },
    Fade { pick: usize, len: Frame },
    Move { pick: usize, to: Frame },
    Undo,
}

fn shape() -> impl Strategy<Value = Shape> {
    let speeds = vec![(1, 1), (1, 1), (2, 1), (1, 2), (3, 2), (2, 3), (-1, 1), (-3, 2)];
    (prop::sample::select(speeds), any::<bool>()).prop_map(|(speed, keyed)| Shape { speed, keyed })
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (2i64..60, shape()).prop_map(|(len, shape)| Action::Append { len, shape }),
        (0i64..300, 2i64..60, shape())
            .prop_map(|(at, len, shape)| Action::Insert { at, len, shape }),
        (0i64..300, 2i64..60, shape())
            .prop_map(|(at, len, shape)| Action::Overwrite { at, len, shape }),
        (0i64..300, 1i64..60).prop_map(|(start, len)| Action::Lift { start, len }),
        (0i64..300, 1i64..60).prop_map(|(start, len)| Action::RippleDelete { start, len }),
        (any::<usize>(), -30i64..30, any::<bool>())
            .prop_map(|(pick, delta, ripple)| Action::TrimIn { pick, delta, ripple }),
        (any::<usize>(), -30i64..30, any::<bool>())
            .prop_map(|(pick, delta, ripple)| Action::TrimOut { pick, delta, ripple }),
        (any::<usize>(), 0i64..100).prop_map(|(pick, offset)| Action::Split { pick, offset }),
        (any::<usize>(), 1i64..30)
            .prop_map(|(pick, duration)| Action::Transition { pick, duration }),
        (any::<usize>(), 0i64..40).prop_map(|(pick, len)| Action::Fade { pick, len }),
        (any::<usize>(), 0i64..400).prop_map(|(pick, to)| Action::Move { pick, to }),
        Just(Action::Undo),
    ]
}

/// Clip over `span` source frames with its own source, so unrelated clips
/// never heal together. Keyed clips carry an animated opacity filter.
fn fresh_clip(serial: &mut usize, span: Frame, shape: Shape) -> Clip {
    *serial += 1;
    let name = format!("src{serial}");
    let mut clip =
        Clip::with_range(name.clone(), SourceRef::new(name, 1000), 200, 200 + span).unwrap();
    clip.set_speed(Rational64::new(shape.speed.0, shape.speed.1)).unwrap();
    if shape.keyed {
        let last = clip.length() - 1;
        let mut opacity = FilterAttachment::new("opacity", FilterScope::Clip)
            .with_parameter("level", ParamValue::Number(1.0));
        opacity.set_keyframe("level", 0, 0.0).unwrap();
        opacity.set_keyframe("level", last / 3, 0.8).unwrap();
        opacity.set_keyframe("level", last, 0.2).unwrap();
        clip.filters.push(opacity);
    }
    clip
}

/// The `pick`-th clip on the first track (modulo the clip count).
fn pick_clip(timeline: &Timeline, pick: usize) -> Option<(usize, &Clip)> {
    let clips: Vec<(usize, &Clip)> = timeline.tracks[0]
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.as_clip().map(|c| (i, c)))
        .collect();
    if clips.is_empty() {
        return None;
    }
    Some(clips[pick % clips.len()])
}

/// Turn an action into a concrete op against `timeline`. `None` for undo or
/// when the action needs a clip and there is none.
fn to_op(action: &Action, timeline: &Timeline, serial: &mut usize) -> Option<EditOp> {
    let track = video(timeline);
    Some(match *action {
        Action::Append { len, shape } => EditOp::Append {
            track,
            clip: fresh_clip(serial, len, shape),
        },
        Action::Insert { at, len, shape } => EditOp::Insert {
            track,
            clip: fresh_clip(serial, len, shape),
            at,
            split_id: Uuid::new_v4(),
        },
        Action::Overwrite { at, len, shape } => EditOp::Overwrite {
            track,
            clip: fresh_clip(serial, len, shape),
            at,
            split_id: Uuid::new_v4(),
        },
        Action::Lift { start, len } => EditOp::Lift {
            track,
            range: TimeRange::new(start, len),
            split_id: Uuid::new_v4(),
        },
        Action::RippleDelete { start, len } => EditOp::RippleDelete {
            track,
            range: TimeRange::new(start, len),
            split_id: Uuid::new_v4(),
        },
        Action::TrimIn { pick, delta, ripple } => {
            let (_, clip) = pick_clip(timeline, pick)?;
            EditOp::TrimIn {
                track,
                item: clip.id,
                new_start: clip.start + delta,
                ripple,
            }
        }
        Action::TrimOut { pick, delta, ripple } => {
            let (_, clip) = pick_clip(timeline, pick)?;
            EditOp::TrimOut {
                track,
                item: clip.id,
                new_end: clip.end() + delta,
                ripple,
            }
        }
        Action::Split { pick, offset } => {
            let (_, clip) = pick_clip(timeline, pick)?;
            EditOp::Split {
                track,
                item: clip.id,
                at: clip.start + offset % clip.length().max(1),
                right_id: Uuid::new_v4(),
            }
        }
        Action::Transition { pick, duration } => {
            let (idx, clip) = pick_clip(timeline, pick)?;
            let next = timeline.tracks[0].items.get(idx + 1)?;
            EditOp::AddTransition {
                track,
                left: clip.id,
                right: next.id(),
                duration,
                transition_id: Uuid::new_v4(),
                type_id: "dissolve".to_string(),
            }
        }
        Action::Fade { pick, len } => {
            let (_, clip) = pick_clip(timeline, pick)?;
            EditOp::SetFade {
                track,
                item: clip.id,
                edge: if len % 2 == 0 { FadeEdge::In } else { FadeEdge::Out },
                length: len,
            }
        }
        Action::Move { pick, to } => {
            let (_, clip) = pick_clip(timeline, pick)?;
            EditOp::MoveClip {
                from: track,
                item: clip.id,
                to: track,
                position: to,
            }
        }
        Action::Undo => return None,
    })
}

fn assert_ordered(timeline: &Timeline) {
    for track in &timeline.tracks {
        for pair in track.items.windows(2) {
            assert!(
                pair[0].end() <= pair[1].start(),
                "{:?} overlaps {:?}",
                pair[0].range(),
                pair[1].range()
            );
        }
        for item in &track.items {
            assert!(item.length() >= 1);
            assert!(item.start() >= 0);
            if let TrackItem::Transition(t) = item {
                assert!(track.items.iter().any(|i| i.end() == t.start));
                assert!(track.items.iter().any(|i| i.start() == t.end()));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn edits_keep_tracks_ordered_and_rejections_change_nothing(
        actions in prop::collection::vec(action(), 1..40)
    ) {
        init_tracing();
        let mut session = EditSession::new(Timeline::default());
        let mut serial = 0;
        for action in &actions {
            let before = session.timeline().clone();
            let result = match to_op(action, &before, &mut serial) {
                Some(op) => session.execute(op).map(drop),
                None if matches!(action, Action::Undo) => session.undo().map(drop),
                None => Ok(()),
            };
            if let Err(e) = result {
                prop_assert!(!e.is_fatal(), "{e}");
                prop_assert_eq!(session.timeline(), &before);
            }
            session.timeline().validate().unwrap();
            assert_ordered(session.timeline());
        }
    }

    #[test]
    fn undo_until_empty_restores_initial_timeline(
        actions in prop::collection::vec(action(), 1..40)
    ) {
        let mut session = EditSession::new(Timeline::default());
        let initial = session.timeline().clone();
        let mut serial = 0;
        for action in &actions {
            let current = session.timeline().clone();
            match to_op(action, &current, &mut serial) {
                Some(op) => { let _ = session.execute(op); }
                None => { let _ = session.undo(); }
            }
        }
        while session.history().can_undo() {
            session.undo().unwrap();
        }
        prop_assert_eq!(session.timeline(), &initial);
    }

    #[test]
    fn apply_invert_apply_equals_single_apply(
        actions in prop::collection::vec(action(), 1..30)
    ) {
        let mut timeline = Timeline::default();
        let mut serial = 0;
        for action in &actions {
            let Some(op) = to_op(action, &timeline, &mut serial) else {
                continue;
            };
            let mut command = EditCommand::new(op);
            let Ok(applied) = command.apply(&timeline) else {
                continue;
            };
            let inverted = command.invert(&applied).unwrap();
            prop_assert_eq!(&inverted, &timeline);
            let reapplied = command.reapply(&inverted).unwrap();
            prop_assert_eq!(&reapplied, &applied);
            timeline = reapplied;
        }
    }

    #[test]
    fn insert_then_ripple_delete_restores_track(
        clips in prop::collection::vec((2i64..50, shape()), 1..8),
        at_fraction in 0.0f64..=1.0,
        span in 2i64..40,
        inserted_shape in shape(),
    ) {
        let mut timeline = Timeline::default();
        let mut serial = 0;
        for (span, shape) in &clips {
            timeline.tracks[0].append(fresh_clip(&mut serial, *span, *shape)).unwrap();
        }
        let before = timeline.tracks[0].clone();
        let at = (before.duration() as f64 * at_fraction).floor() as Frame;

        let inserted = fresh_clip(&mut serial, span, inserted_shape);
        let (inserted_id, len) = (inserted.id, inserted.length());
        let track = &mut timeline.tracks[0];
        match track.insert(inserted, at, Uuid::new_v4()) {
            Ok(()) => {}
            // Slowed clips only have cut points on whole source frames.
            Err(SpliceError::InvalidRange(_)) => {
                prop_assert_eq!(&*track, &before);
                return Ok(());
            }
            Err(e) => return Err(TestCaseError::fail(e.to_string())),
        }
        let placed = track.item(inserted_id).unwrap().range();
        prop_assert_eq!(placed, TimeRange::new(at, len));

        track.ripple_delete(TimeRange::new(at, len), Uuid::new_v4()).unwrap();
        prop_assert_eq!(&*track, &before);
    }
}
