//! Sequential batch scheduler.
//!
//! One background thread drains the queue through a single
//! [`ProcessingWorker`]. Callers interact only through the control methods
//! and the event channel returned by [`JobScheduler::new`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::jobs::{BatchQueue, Job, JobId, JobRecord, JobStatus};
use crate::models::Video;
use crate::timeline::ZoneTimeline;

use super::cancel::CancelToken;
use super::errors::{JobError, SchedulerError};
use super::types::{JobOutcome, JobProgress, SchedulerEvent, SchedulerState};
use super::worker::ProcessingWorker;

/// Counters for the batch in progress.
#[derive(Debug, Default)]
struct BatchCounters {
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
}

impl BatchCounters {
    /// Count a job that reached a terminal status.
    fn record(&mut self, status: &JobStatus) {
        match status {
            JobStatus::Succeeded => self.succeeded += 1,
            JobStatus::Failed(_) => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Queued | JobStatus::Running => return,
        }
        self.completed += 1;
    }
}

/// Everything guarded by the scheduler lock.
struct Inner {
    queue: BatchQueue,
    state: SchedulerState,
    /// Job currently inside the worker and its cancel token.
    active: Option<(JobId, CancelToken)>,
    /// Every job ever enqueued, in enqueue order.
    records: Vec<JobRecord>,
    /// Destinations successfully written so far.
    written: HashSet<PathBuf>,
    batch: BatchCounters,
}

impl Inner {
    fn set_status(&mut self, id: JobId, status: JobStatus) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.status = status;
        }
    }

    fn batch_progress(&self, current: Option<JobProgress>) -> SchedulerEvent {
        SchedulerEvent::BatchProgress {
            jobs_completed: self.batch.completed,
            jobs_total: self.batch.total,
            current,
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    worker: ProcessingWorker,
    events: Sender<SchedulerEvent>,
}

impl Shared {
    fn emit(&self, event: SchedulerEvent) {
        // The receiver may have been dropped; events are then discarded.
        let _ = self.events.send(event);
    }
}

/// Runs queued jobs one after another on a background thread.
///
/// State machine: `Idle -> Running -> Idle`, or
/// `Running -> Cancelling -> Idle` after [`cancel_all`](Self::cancel_all).
pub struct JobScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Create an idle scheduler and the receiving end of its event channel.
    pub fn new(worker: ProcessingWorker) -> (Self, Receiver<SchedulerEvent>) {
        let (events, rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                queue: BatchQueue::new(),
                state: SchedulerState::Idle,
                active: None,
                records: Vec::new(),
                written: HashSet::new(),
                batch: BatchCounters::default(),
            }),
            worker,
            events,
        });
        let scheduler = Self {
            shared,
            handle: Mutex::new(None),
        };
        (scheduler, rx)
    }

    /// Queue a job, snapshotting `timeline`.
    ///
    /// Jobs enqueued while a batch runs join that batch.
    pub fn enqueue(
        &self,
        video: Arc<Video>,
        timeline: &ZoneTimeline,
        destination: impl Into<PathBuf>,
    ) -> JobId {
        let job = Job::new(video, timeline, destination);
        let mut inner = self.shared.inner.lock();
        inner.records.push(job.record());
        if inner.state == SchedulerState::Running {
            inner.batch.total += 1;
        }
        inner.queue.enqueue(job)
    }

    /// Start processing the queue.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut handle = self.handle.lock();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SchedulerState::Idle {
                return Err(SchedulerError::AlreadyRunning);
            }
            inner.state = SchedulerState::Running;
            inner.batch = BatchCounters {
                total: inner.queue.len(),
                ..BatchCounters::default()
            };
            tracing::info!("Starting batch of {} jobs", inner.batch.total);
        }

        // The previous batch thread has already reached Idle.
        if let Some(previous) = handle.take() {
            let _ = previous.join();
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("wmr-scheduler".to_string())
            .spawn(move || run_batch(&shared));

        match spawned {
            Ok(join) => {
                *handle = Some(join);
                Ok(())
            }
            Err(e) => {
                self.shared.inner.lock().state = SchedulerState::Idle;
                Err(SchedulerError::Spawn(e))
            }
        }
    }

    /// Cancel everything: queued jobs immediately, the running job
    /// cooperatively.
    pub fn cancel_all(&self) {
        let mut inner = self.shared.inner.lock();
        let drained = inner.queue.drain();
        tracing::info!("Cancelling batch ({} queued jobs)", drained.len());

        for job in &drained {
            self.cancel_queued(&mut inner, job.id);
        }
        if let Some((_, ref token)) = inner.active {
            token.cancel();
        }
        if inner.state == SchedulerState::Running {
            inner.state = SchedulerState::Cancelling;
        }
    }

    /// Cancel one job. Returns false if it is unknown or already finished.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let mut inner = self.shared.inner.lock();
        if inner.queue.remove(job_id).is_some() {
            self.cancel_queued(&mut inner, job_id);
            return true;
        }
        match inner.active {
            Some((id, ref token)) if id == job_id => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    fn cancel_queued(&self, inner: &mut Inner, job_id: JobId) {
        inner.set_status(job_id, JobStatus::Cancelled);
        if inner.state != SchedulerState::Idle {
            inner.batch.record(&JobStatus::Cancelled);
        }
        self.shared.emit(SchedulerEvent::JobFinished {
            job_id,
            status: JobStatus::Cancelled,
            error: None,
        });
    }

    /// Current status of a job.
    pub fn status(&self, job_id: JobId) -> Option<JobStatus> {
        let inner = self.shared.inner.lock();
        inner
            .records
            .iter()
            .find(|r| r.id == job_id)
            .map(|r| r.status.clone())
    }

    /// Every job this scheduler has seen, in enqueue order.
    pub fn statuses(&self) -> Vec<JobRecord> {
        self.shared.inner.lock().records.clone()
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.inner.lock().state
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.inner.lock().queue.len()
    }

    /// Block until the current batch (if any) has finished.
    pub fn wait(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked");
                self.shared.inner.lock().state = SchedulerState::Idle;
            }
        }
    }
}

/// Body of the scheduler thread.
fn run_batch(shared: &Shared) {
    let aborted = loop {
        let next = {
            let mut inner = shared.inner.lock();
            if inner.state != SchedulerState::Running {
                break None;
            }
            match inner.queue.dequeue_next() {
                Some(job) => {
                    let token = CancelToken::new();
                    inner.active = Some((job.id, token.clone()));
                    Some((job, token))
                }
                None => break None,
            }
        };
        let Some((mut job, cancel)) = next else {
            break None;
        };

        shared.emit(SchedulerEvent::JobStarted {
            job_id: job.id,
            name: job.name(),
        });

        let outcome = if shared.inner.lock().written.contains(&job.destination) {
            tracing::warn!(
                "Job {} skipped: {} already written",
                job.id,
                job.destination.display()
            );
            JobOutcome::Failed(JobError::DestinationCollision {
                path: job.destination.clone(),
            })
        } else {
            run_job(shared, &mut job, &cancel)
        };

        let status = outcome.status();
        let fatal = outcome.error().filter(|e| e.is_batch_fatal()).cloned();
        let batch_progress = {
            let mut inner = shared.inner.lock();
            inner.active = None;
            inner.set_status(job.id, status.clone());
            inner.batch.record(&status);
            if let JobOutcome::Succeeded { ref output } = outcome {
                inner.written.insert(output.clone());
                inner.written.insert(job.destination.clone());
            }
            inner.batch_progress(None)
        };

        shared.emit(SchedulerEvent::JobFinished {
            job_id: job.id,
            status,
            error: outcome.error().cloned(),
        });
        shared.emit(batch_progress);

        if let Some(error) = fatal {
            break Some(error.to_string());
        }
    };

    let mut inner = shared.inner.lock();
    inner.state = SchedulerState::Idle;
    inner.active = None;
    if let Some(reason) = aborted {
        tracing::error!(
            "Batch aborted: {} ({} jobs left queued)",
            reason,
            inner.queue.len()
        );
        shared.emit(SchedulerEvent::BatchAborted { reason });
    }
    let batch = &inner.batch;
    tracing::info!(
        "Batch finished: {} succeeded, {} failed, {} cancelled",
        batch.succeeded,
        batch.failed,
        batch.cancelled
    );
    shared.emit(SchedulerEvent::BatchFinished {
        succeeded: batch.succeeded,
        failed: batch.failed,
        cancelled: batch.cancelled,
    });
}

fn run_job(shared: &Shared, job: &mut Job, cancel: &CancelToken) -> JobOutcome {
    let job_id = job.id;
    let mut running = false;
    shared.worker.run(job, cancel, &mut |progress| {
        let batch_progress = {
            let mut inner = shared.inner.lock();
            if !running {
                inner.set_status(job_id, JobStatus::Running);
                running = true;
            }
            inner.batch_progress(Some(progress))
        };
        shared.emit(SchedulerEvent::JobProgress { job_id, progress });
        shared.emit(batch_progress);
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::models::Zone;
    use crate::orchestrator::fake_backend::{Behavior, FakeBackend};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        backend: Arc<FakeBackend>,
        scheduler: JobScheduler,
        events: Receiver<SchedulerEvent>,
    }

    impl Fixture {
        fn new(backend: FakeBackend) -> Self {
            crate::logging::init_test_tracing();
            let dir = tempdir().unwrap();
            let backend = Arc::new(backend);
            let worker = ProcessingWorker::new(backend.clone(), dir.path().join("work"));
            let (scheduler, events) = JobScheduler::new(worker);
            Self {
                dir,
                backend,
                scheduler,
                events,
            }
        }

        fn enqueue(&self, name: &str) -> JobId {
            let dest = self.dir.path().join("out").join(format!("clean_{}", name));
            self.enqueue_to(name, dest)
        }

        fn enqueue_to(&self, name: &str, destination: PathBuf) -> JobId {
            let path = self.dir.path().join(name);
            fs::write(&path, b"video").unwrap();
            let video = Arc::new(Video::new(path, 6, 25.0, 64, 64));
            let mut timeline = ZoneTimeline::for_video(&video);
            timeline.set(0, vec![Zone::new(1, 1, 9, 9).unwrap()]).unwrap();
            self.scheduler.enqueue(video, &timeline, destination)
        }

        fn run_to_end(&self) -> Vec<SchedulerEvent> {
            self.scheduler.start().unwrap();
            self.scheduler.wait();
            self.events.try_iter().collect()
        }

        fn statuses(&self, ids: &[JobId]) -> Vec<JobStatus> {
            ids.iter()
                .map(|id| self.scheduler.status(*id).unwrap())
                .collect()
        }
    }

    fn finished(events: &[SchedulerEvent]) -> Vec<(JobId, JobStatus)> {
        events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::JobFinished { job_id, status, .. } => Some((*job_id, status.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn failed_job_does_not_stop_batch() {
        let fx = Fixture::new(FakeBackend::new().with("b.mp4", Behavior::Fail("bad weights".into())));
        let ids = [fx.enqueue("a.mp4"), fx.enqueue("b.mp4"), fx.enqueue("c.mp4")];

        let events = fx.run_to_end();

        let statuses = fx.statuses(&ids);
        assert_eq!(statuses[0], JobStatus::Succeeded);
        assert!(matches!(statuses[1], JobStatus::Failed(ref r) if r.contains("bad weights")));
        assert_eq!(statuses[2], JobStatus::Succeeded);
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
        assert_eq!(
            events.last(),
            Some(&SchedulerEvent::BatchFinished {
                succeeded: 2,
                failed: 1,
                cancelled: 0
            })
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::BatchAborted { .. })));
    }

    #[test]
    fn cancel_all_during_second_job() {
        let (started_tx, started_rx) = channel::unbounded();
        let fx = Fixture::new(
            FakeBackend::new()
                .with("b.mp4", Behavior::BlockUntilCancelled)
                .notify_started(started_tx),
        );
        let ids = [fx.enqueue("a.mp4"), fx.enqueue("b.mp4"), fx.enqueue("c.mp4")];

        fx.scheduler.start().unwrap();
        assert_eq!(fx.scheduler.start().unwrap_err().to_string(), "Scheduler is already running");

        let timeout = Duration::from_secs(5);
        assert_eq!(started_rx.recv_timeout(timeout).unwrap(), "a.mp4");
        assert_eq!(started_rx.recv_timeout(timeout).unwrap(), "b.mp4");
        fx.scheduler.cancel_all();
        fx.scheduler.wait();

        assert_eq!(
            fx.statuses(&ids),
            vec![JobStatus::Succeeded, JobStatus::Cancelled, JobStatus::Cancelled]
        );
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
        assert_eq!(fx.backend.calls(), 2);
        assert!(!fx.dir.path().join("out").join("clean_b.mp4").exists());
    }

    #[test]
    fn cancelling_running_job_lets_batch_continue() {
        let (started_tx, started_rx) = channel::unbounded();
        let fx = Fixture::new(
            FakeBackend::new()
                .with("a.mp4", Behavior::BlockUntilCancelled)
                .notify_started(started_tx),
        );
        let ids = [fx.enqueue("a.mp4"), fx.enqueue("b.mp4")];

        fx.scheduler.start().unwrap();
        let timeout = Duration::from_secs(5);
        assert_eq!(started_rx.recv_timeout(timeout).unwrap(), "a.mp4");

        assert!(fx.scheduler.cancel(ids[0]));
        assert_ne!(fx.scheduler.state(), SchedulerState::Cancelling);
        fx.scheduler.wait();
        let events: Vec<SchedulerEvent> = fx.events.try_iter().collect();

        assert_eq!(
            fx.statuses(&ids),
            vec![JobStatus::Cancelled, JobStatus::Succeeded]
        );
        assert_eq!(fx.backend.calls(), 2);
        assert!(!fx.dir.path().join("out").join("clean_a.mp4").exists());
        assert!(fx.dir.path().join("out").join("clean_b.mp4").is_file());
        assert!(!events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::BatchAborted { .. })));
        assert_eq!(
            events.last(),
            Some(&SchedulerEvent::BatchFinished {
                succeeded: 1,
                failed: 0,
                cancelled: 1
            })
        );
        assert!(!fx.scheduler.cancel(ids[0]));
    }

    #[test]
    fn second_writer_of_a_destination_fails() {
        let fx = Fixture::new(FakeBackend::new());
        let shared_dest = fx.dir.path().join("out").join("clean.mp4");
        let first = fx.enqueue_to("a.mp4", shared_dest.clone());
        let second = fx.enqueue_to("b.mp4", shared_dest);

        fx.run_to_end();

        assert_eq!(fx.scheduler.status(first), Some(JobStatus::Succeeded));
        match fx.scheduler.status(second) {
            Some(JobStatus::Failed(reason)) => assert!(reason.contains("already written")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(fx.backend.calls(), 1);
    }

    #[test]
    fn unavailable_backend_aborts_batch() {
        let fx = Fixture::new(FakeBackend::new().with("a.mp4", Behavior::Unavailable));
        let ids = [fx.enqueue("a.mp4"), fx.enqueue("b.mp4"), fx.enqueue("c.mp4")];

        let events = fx.run_to_end();

        let statuses = fx.statuses(&ids);
        assert!(matches!(statuses[0], JobStatus::Failed(_)));
        assert_eq!(statuses[1], JobStatus::Queued);
        assert_eq!(statuses[2], JobStatus::Queued);
        assert_eq!(fx.scheduler.queued(), 2);

        let aborted = events
            .iter()
            .filter(|e| matches!(e, SchedulerEvent::BatchAborted { .. }))
            .count();
        assert_eq!(aborted, 1);
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn progress_is_monotonic_and_terminal_event_last() {
        let fx = Fixture::new(FakeBackend::new().with("a.mp4", Behavior::Jittery));
        let ids = [fx.enqueue("a.mp4"), fx.enqueue("b.mp4")];

        let events = fx.run_to_end();

        for id in ids {
            let mine: Vec<&SchedulerEvent> = events
                .iter()
                .filter(|e| match e {
                    SchedulerEvent::JobStarted { job_id, .. }
                    | SchedulerEvent::JobProgress { job_id, .. }
                    | SchedulerEvent::JobFinished { job_id, .. } => *job_id == id,
                    _ => false,
                })
                .collect();

            assert!(matches!(mine.first(), Some(SchedulerEvent::JobStarted { .. })));
            assert!(matches!(mine.last(), Some(SchedulerEvent::JobFinished { .. })));

            let completed: Vec<u64> = mine
                .iter()
                .filter_map(|e| match e {
                    SchedulerEvent::JobProgress { progress, .. } => Some(progress.frames_completed),
                    _ => None,
                })
                .collect();
            assert!(completed.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(completed.last(), Some(&6));
        }

        let last_batch = events.iter().rev().find_map(|e| match e {
            SchedulerEvent::BatchProgress {
                jobs_completed,
                jobs_total,
                ..
            } => Some((*jobs_completed, *jobs_total)),
            _ => None,
        });
        assert_eq!(last_batch, Some((2, 2)));
    }

    #[test]
    fn cancel_queued_job_by_id() {
        let fx = Fixture::new(FakeBackend::new());
        let a = fx.enqueue("a.mp4");
        let b = fx.enqueue("b.mp4");

        assert!(fx.scheduler.cancel(b));
        assert!(!fx.scheduler.cancel(b));
        assert_eq!(fx.scheduler.status(b), Some(JobStatus::Cancelled));

        let events = fx.run_to_end();
        assert_eq!(fx.scheduler.status(a), Some(JobStatus::Succeeded));
        assert_eq!(fx.backend.calls(), 1);
        assert_eq!(
            finished(&events),
            vec![(b, JobStatus::Cancelled), (a, JobStatus::Succeeded)]
        );
    }

    #[test]
    fn restart_after_batch() {
        let fx = Fixture::new(FakeBackend::new());
        let a = fx.enqueue("a.mp4");
        fx.run_to_end();

        let b = fx.enqueue("b.mp4");
        fx.run_to_end();

        assert_eq!(fx.statuses(&[a, b]), vec![JobStatus::Succeeded; 2]);
        let records = fx.scheduler.statuses();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "b.mp4");
    }
}
