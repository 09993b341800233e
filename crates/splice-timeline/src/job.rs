//! Background render/encode jobs over immutable timeline snapshots.
//!
//! A job never touches the live timeline: it is submitted with an
//! `Arc<Timeline>` taken from a [`SnapshotReader`](crate::session::SnapshotReader)
//! and the actual encoding is done by a [`JobWorker`] implementation.
//! Status changes are pushed as [`JobEvent`]s over a channel.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use splice_core::limits::JOB_PROGRESS_INTERVAL;
use splice_core::{Frame, Result, SpliceError, TimeRange};
use tracing::{debug, info, warn};

use crate::timeline::Timeline;

pub type JobId = u64;

// ── Configuration ───────────────────────────────────────────────

/// Job runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRunnerConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Emit a progress event every this many frames.
    pub progress_every: u64,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() / 2).max(1),
            progress_every: JOB_PROGRESS_INTERVAL,
        }
    }
}

impl JobRunnerConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| SpliceError::Serialization(format!("Invalid job runner config: {e}")))
    }
}

// ── Job description ─────────────────────────────────────────────

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Done,
    Stopped,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Failed)
    }
}

/// Where and what to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output file path.
    pub path: PathBuf,
    /// Container/codec preset name understood by the worker.
    pub format: String,
    /// Range to render (None = entire timeline).
    pub range: Option<TimeRange>,
}

impl OutputSpec {
    pub fn new(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            range: None,
        }
    }

    /// Set the render range.
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// First timeline frame rendered.
    pub fn first_frame(&self) -> Frame {
        self.range.map_or(0, |r| r.start)
    }

    /// Number of frames this output covers on `timeline`.
    pub fn total_frames(&self, timeline: &Timeline) -> u64 {
        let length = self.range.map_or_else(|| timeline.duration(), |r| r.length);
        length.max(0).unsigned_abs()
    }
}

/// Status pushed to event subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub state: JobState,
    /// Completed fraction, 0.0 to 1.0.
    pub progress: f64,
    pub log_excerpt: String,
}

/// Renders frames of a snapshot. Implemented by the encoder integration.
pub trait JobWorker: Send + Sync {
    /// Frames the job will process.
    fn total_frames(&self, timeline: &Timeline, output: &OutputSpec) -> u64 {
        output.total_frames(timeline)
    }

    /// Render one timeline frame.
    fn process_frame(&self, timeline: &Timeline, output: &OutputSpec, frame: Frame) -> Result<()>;

    /// Finalize the output. The returned text becomes the log excerpt.
    fn finish(&self, _output: &OutputSpec) -> Result<String> {
        Ok(String::new())
    }
}

// ── Runner internals ────────────────────────────────────────────

#[derive(Debug, Default)]
struct JobControl {
    cancel: AtomicBool,
    pause: AtomicBool,
}

struct JobEntry {
    /// Released once the job is finished.
    snapshot: Option<Arc<Timeline>>,
    output: OutputSpec,
    state: JobState,
    /// Paused by the user; skipped by workers until resumed.
    held: bool,
    /// Next frame offset to process, kept across pause/resume.
    next_frame: u64,
    control: Arc<JobControl>,
}

#[derive(Default)]
struct Queue {
    order: VecDeque<JobId>,
    jobs: HashMap<JobId, JobEntry>,
    next_id: JobId,
    shutdown: bool,
}

impl Queue {
    fn take_next(&mut self) -> Option<JobId> {
        let pos = self
            .order
            .iter()
            .position(|id| self.jobs.get(id).is_some_and(|job| !job.held))?;
        self.order.remove(pos)
    }

    fn entry(&mut self, id: JobId) -> Result<&mut JobEntry> {
        self.jobs
            .get_mut(&id)
            .ok_or_else(|| SpliceError::NotFound(format!("job {id}")))
    }
}

struct Shared {
    queue: Mutex<Queue>,
    /// Signalled when a job becomes runnable or on shutdown.
    available: Condvar,
    /// Signalled whenever a job leaves `Running`.
    changed: Condvar,
    subscribers: Mutex<Vec<Sender<JobEvent>>>,
    worker: Arc<dyn JobWorker>,
    progress_every: u64,
}

impl Shared {
    fn emit(&self, event: JobEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

enum Outcome {
    Done(String),
    Paused,
    Stopped,
    Failed(String),
}

fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    done as f64 / total as f64
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let (id, snapshot, output, control, start) = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(id) = queue.take_next() {
                    if let Some(job) = queue.jobs.get_mut(&id) {
                        let Some(snapshot) = job.snapshot.clone() else {
                            continue;
                        };
                        job.state = JobState::Running;
                        break (
                            id,
                            snapshot,
                            job.output.clone(),
                            Arc::clone(&job.control),
                            job.next_frame,
                        );
                    }
                    continue;
                }
                shared.available.wait(&mut queue);
            }
        };

        let total = shared.worker.total_frames(&snapshot, &output);
        info!(job = id, path = %output.path.display(), total, "job started");
        shared.emit(JobEvent {
            job_id: id,
            state: JobState::Running,
            progress: fraction(start, total),
            log_excerpt: String::new(),
        });

        let mut frame = start;
        let outcome = loop {
            if control.cancel.load(Ordering::Relaxed) {
                break Outcome::Stopped;
            }
            if control.pause.load(Ordering::Relaxed) {
                break Outcome::Paused;
            }
            if frame >= total {
                break match shared.worker.finish(&output) {
                    Ok(log) => Outcome::Done(log),
                    Err(e) => Outcome::Failed(e.to_string()),
                };
            }
            let at = output.first_frame() + frame as Frame;
            if let Err(e) = shared.worker.process_frame(&snapshot, &output, at) {
                break Outcome::Failed(e.to_string());
            }
            frame += 1;
            if shared.progress_every > 0 && frame % shared.progress_every == 0 && frame < total {
                shared.emit(JobEvent {
                    job_id: id,
                    state: JobState::Running,
                    progress: fraction(frame, total),
                    log_excerpt: String::new(),
                });
            }
        };

        drop(snapshot);

        let (state, log_excerpt) = match outcome {
            Outcome::Done(log) => {
                info!(job = id, frames = frame, "job done");
                (JobState::Done, log)
            }
            Outcome::Paused => {
                info!(job = id, frame, "job paused");
                (JobState::Pending, format!("paused at frame {frame}"))
            }
            Outcome::Stopped => {
                info!(job = id, frame, "job stopped");
                (JobState::Stopped, format!("stopped at frame {frame}"))
            }
            Outcome::Failed(message) => {
                warn!(job = id, frame, error = %message, "job failed");
                (JobState::Failed, message)
            }
        };

        {
            let mut queue = shared.queue.lock();
            if let Some(job) = queue.jobs.get_mut(&id) {
                job.state = state;
                job.next_frame = frame;
                if state.is_finished() {
                    job.snapshot = None;
                }
                if state == JobState::Pending {
                    job.held = true;
                    job.control.pause.store(false, Ordering::Relaxed);
                    queue.order.push_front(id);
                }
            }
            // Emitted under the queue lock so the event precedes any waiter waking.
            shared.emit(JobEvent {
                job_id: id,
                state,
                progress: fraction(frame, total),
                log_excerpt,
            });
        }
        shared.changed.notify_all();
    }
}

// ── Runner ──────────────────────────────────────────────────────

/// Queue of render jobs processed by a pool of worker threads.
pub struct JobRunner {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl JobRunner {
    pub fn new(config: JobRunnerConfig, worker: Arc<dyn JobWorker>) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                next_id: 1,
                ..Queue::default()
            }),
            available: Condvar::new(),
            changed: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
            worker,
            progress_every: config.progress_every,
        });
        let mut threads = Vec::with_capacity(config.workers.max(1));
        for n in 0..config.workers.max(1) {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("splice-job-{n}"))
                .spawn(move || worker_loop(shared))?;
            threads.push(handle);
        }
        debug!(workers = threads.len(), "job runner started");
        Ok(Self { shared, threads })
    }

    /// Receive every later [`JobEvent`].
    pub fn subscribe(&self) -> Receiver<JobEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Queue a render of `snapshot`.
    pub fn submit(&self, snapshot: Arc<Timeline>, output: OutputSpec) -> Result<JobId> {
        if let Some(range) = output.range {
            if range.start < 0 || range.is_empty() {
                return Err(SpliceError::InvalidRange(format!(
                    "cannot render {range}"
                )));
            }
        }
        let id = {
            let mut queue = self.shared.queue.lock();
            let id = queue.next_id;
            queue.next_id += 1;
            queue.jobs.insert(
                id,
                JobEntry {
                    snapshot: Some(snapshot),
                    output,
                    state: JobState::Pending,
                    held: false,
                    next_frame: 0,
                    control: Arc::default(),
                },
            );
            queue.order.push_back(id);
            id
        };
        info!(job = id, "job submitted");
        self.shared.emit(JobEvent {
            job_id: id,
            state: JobState::Pending,
            progress: 0.0,
            log_excerpt: String::new(),
        });
        self.shared.available.notify_one();
        Ok(id)
    }

    pub fn state(&self, id: JobId) -> Option<JobState> {
        self.shared.queue.lock().jobs.get(&id).map(|job| job.state)
    }

    /// Pending job ids in the order workers will pick them up.
    pub fn pending(&self) -> Vec<JobId> {
        self.shared.queue.lock().order.iter().copied().collect()
    }

    /// Stop a job and return it to the queue, held until [`resume`](Self::resume).
    ///
    /// Blocks until a running job has left `Running`.
    pub fn pause(&self, id: JobId) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        let job = queue.entry(id)?;
        let state = job.state;
        match state {
            JobState::Pending => {
                job.held = true;
                Ok(())
            }
            JobState::Running => {
                job.control.pause.store(true, Ordering::Relaxed);
                while queue.jobs.get(&id).is_some_and(|j| j.state == JobState::Running) {
                    self.shared.changed.wait(&mut queue);
                }
                Ok(())
            }
            state => Err(SpliceError::Job(format!("job {id} is already {state:?}"))),
        }
    }

    /// Make a paused job runnable again; it continues where it stopped.
    pub fn resume(&self, id: JobId) -> Result<()> {
        {
            let mut queue = self.shared.queue.lock();
            let job = queue.entry(id)?;
            if job.state != JobState::Pending || !job.held {
                return Err(SpliceError::Job(format!("job {id} is not paused")));
            }
            job.held = false;
        }
        debug!(job = id, "job resumed");
        self.shared.available.notify_one();
        Ok(())
    }

    /// Move a pending job to the front of the queue.
    pub fn reorder(&self, id: JobId) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if queue.entry(id)?.state != JobState::Pending {
            return Err(SpliceError::Job(format!("job {id} is not pending")));
        }
        queue.order.retain(|&other| other != id);
        queue.order.push_front(id);
        Ok(())
    }

    /// Stop a job. A running job is signalled and this call waits for its
    /// worker to leave `Running`. Cancelling a finished job does nothing.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        let job = queue.entry(id)?;
        let state = job.state;
        match state {
            JobState::Pending => {
                job.state = JobState::Stopped;
                let total = job
                    .snapshot
                    .take()
                    .map_or(0, |snapshot| job.output.total_frames(&snapshot));
                let progress = fraction(job.next_frame, total);
                queue.order.retain(|&other| other != id);
                drop(queue);
                info!(job = id, "pending job stopped");
                self.shared.emit(JobEvent {
                    job_id: id,
                    state: JobState::Stopped,
                    progress,
                    log_excerpt: String::new(),
                });
                self.shared.changed.notify_all();
                Ok(())
            }
            JobState::Running => {
                job.control.cancel.store(true, Ordering::Relaxed);
                while queue.jobs.get(&id).is_some_and(|j| j.state == JobState::Running) {
                    self.shared.changed.wait(&mut queue);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Block until the job finishes and return its final state.
    pub fn wait(&self, id: JobId) -> Result<JobState> {
        let mut queue = self.shared.queue.lock();
        loop {
            let job = queue.entry(id)?;
            if job.state.is_finished() {
                return Ok(job.state);
            }
            if job.held {
                return Err(SpliceError::Job(format!("job {id} is paused")));
            }
            self.shared.changed.wait(&mut queue);
        }
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            for job in queue.jobs.values() {
                job.control.cancel.store(true, Ordering::Relaxed);
            }
        }
        self.shared.available.notify_all();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("job worker panicked");
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
