//! Integration tests for snapshot handoff, change notices and render jobs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use splice_core::{Frame, Result, SpliceError};
use splice_timeline::{
    ChangeKind, EditSession, JobRunner, JobRunnerConfig, JobState, JobWorker, MediaSources,
    OutputSpec, SourceRef, Timeline,
};

use crate::support::{clip, init_tracing, video};

/// Worker that sums the number of clips under each rendered frame.
#[derive(Default)]
struct CoverageWorker {
    frames: AtomicU64,
    covered: AtomicU64,
}

impl JobWorker for CoverageWorker {
    fn process_frame(&self, timeline: &Timeline, _: &OutputSpec, frame: Frame) -> Result<()> {
        let covered = timeline
            .tracks
            .iter()
            .filter(|track| track.item_at(frame).is_some())
            .count() as u64;
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.covered.fetch_add(covered, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn readers_only_observe_committed_revisions() {
    init_tracing();
    let mut session = EditSession::new(Timeline::default());
    let track = video(session.timeline());
    let reader = session.reader();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let reader = reader.clone();
            thread::spawn(move || {
                let mut last = 0;
                for _ in 0..2000 {
                    let (revision, timeline) = reader.snapshot();
                    assert!(revision >= last);
                    last = revision;
                    timeline.validate().unwrap();
                    // Every committed revision is one append: n clips of 10 frames.
                    assert_eq!(timeline.duration(), revision as i64 * 10);
                }
            })
        })
        .collect();

    for n in 0..50 {
        session.append(track, clip(&format!("c{n}"), 10)).unwrap();
    }
    for handle in readers {
        handle.join().unwrap();
    }
    assert_eq!(reader.revision(), 50);
}

#[test]
fn notices_follow_edit_undo_redo() {
    init_tracing();
    let mut session = EditSession::new(Timeline::default());
    let track = video(session.timeline());
    let notices = session.subscribe();

    session.append(track, clip("a", 40)).unwrap();
    session.append(track, clip("b", 40)).unwrap();
    session.undo().unwrap();
    session.redo().unwrap();

    let received: Vec<_> = notices.try_iter().collect();
    let kinds: Vec<ChangeKind> = received.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        [
            ChangeKind::Applied,
            ChangeKind::Applied,
            ChangeKind::Undone,
            ChangeKind::Redone
        ]
    );
    let revisions: Vec<u64> = received.iter().map(|n| n.revision).collect();
    assert_eq!(revisions, [1, 2, 3, 4]);
    assert_eq!(received[1].affected[0].range.start, 40);
    assert_eq!(received[1].affected[0].track, Some(track));
}

#[test]
fn render_job_uses_snapshot_not_live_timeline() {
    init_tracing();
    let mut session = EditSession::new(Timeline::default());
    let track = video(session.timeline());
    session.append(track, clip("a", 30)).unwrap();
    session.append(track, clip("b", 30)).unwrap();

    let worker = Arc::new(CoverageWorker::default());
    let config = JobRunnerConfig {
        workers: 2,
        ..JobRunnerConfig::default()
    };
    let runner = JobRunner::new(config, Arc::clone(&worker) as Arc<dyn JobWorker>).unwrap();
    let events = runner.subscribe();

    let snapshot = session.reader().latest();
    let id = runner
        .submit(snapshot, OutputSpec::new("/tmp/render.mov", "prores"))
        .unwrap();

    // Later edits do not reach the job.
    session.append(track, clip("c", 30)).unwrap();

    assert_eq!(runner.wait(id).unwrap(), JobState::Done);
    assert_eq!(worker.frames.load(Ordering::Relaxed), 60);
    assert_eq!(worker.covered.load(Ordering::Relaxed), 60);
    assert_eq!(session.timeline().duration(), 90);

    let last = events.try_iter().filter(|e| e.job_id == id).last().unwrap();
    assert_eq!(last.state, JobState::Done);
}

#[test]
fn offline_sources_are_reported_not_removed() {
    init_tracing();
    let mut sources = MediaSources::new();
    sources.add(SourceRef::new("a", 1000));
    sources.add(SourceRef::new("b", 1000));
    let registry = Arc::new(sources.clone());

    let mut session = EditSession::new(Timeline::default()).with_sources(registry);
    let track = video(session.timeline());
    session.append(track, clip("a", 10)).unwrap();
    session.append(track, clip("b", 10)).unwrap();
    assert!(matches!(
        session.append(track, clip("c", 10)),
        Err(SpliceError::SourceUnavailable(_))
    ));

    sources.remove("b");
    let offline = session.offline_clips(&sources);
    assert_eq!(offline.len(), 1);
    let b = session.timeline().tracks[0].items[1].id();
    assert_eq!(offline[0].1, b);
    assert_eq!(session.timeline().clip_count(), 2);
}
