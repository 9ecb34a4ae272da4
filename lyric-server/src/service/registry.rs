//! Job registry
//!
//! Owns the single active job. Starting a job while another one is active is
//! rejected; a finished job stays visible through `status()` until the next
//! one starts.

use crate::backend::Backends;
use crate::service::batch::{BatchRunner, JobOptions};
use crate::service::event_bus::{EventBus, Subscription};
use crate::service::worker::BlockingWorker;
use lyric_core::domain::event::Event;
use lyric_core::domain::job::{FileTask, Job, JobState};
use lyric_core::dto::task::TaskStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Registry error type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A task is already running")]
    AlreadyRunning,

    #[error("No files to process")]
    NoFiles,
}

struct ActiveJob {
    job: Arc<Mutex<Job>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<JobState>>,
}

/// Single-job registry
pub struct JobRegistry {
    current: Mutex<Option<ActiveJob>>,
    bus: Arc<EventBus>,
    worker: Arc<BlockingWorker>,
    backends: Backends,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobRegistry {
    pub fn new(bus: Arc<EventBus>, worker: Arc<BlockingWorker>, backends: Backends) -> Self {
        Self {
            current: Mutex::new(None),
            bus,
            worker,
            backends,
        }
    }

    /// Starts a new job over `files`
    ///
    /// Must be called from within a tokio runtime; the job runs on a spawned task.
    pub fn start(&self, files: Vec<FileTask>, options: JobOptions) -> Result<Uuid, RegistryError> {
        if files.is_empty() {
            return Err(RegistryError::NoFiles);
        }

        let mut current = lock(&self.current);

        if let Some(active) = current.as_ref() {
            if lock(&active.job).state.is_active() {
                return Err(RegistryError::AlreadyRunning);
            }
        }

        let job = Job::new(files);
        let id = job.id;
        let count = job.total();
        let job = Arc::new(Mutex::new(job));
        let cancel = Arc::new(AtomicBool::new(false));

        // The previous job already published its terminal event
        self.bus.reset();

        let runner = BatchRunner::new(
            Arc::clone(&job),
            Arc::clone(&cancel),
            Arc::clone(&self.bus),
            Arc::clone(&self.worker),
            self.backends.clone(),
            options,
        );
        let handle = tokio::spawn(runner.run());

        *current = Some(ActiveJob {
            job,
            cancel,
            handle: Some(handle),
        });

        info!("Job {} accepted with {} files", id, count);
        Ok(id)
    }

    /// Requests cancellation of the active job
    ///
    /// The file in flight finishes first. Returns false when no job is active.
    pub fn cancel(&self) -> bool {
        let current = lock(&self.current);

        match current.as_ref() {
            Some(active) if lock(&active.job).state.is_active() => {
                if !active.cancel.swap(true, Ordering::SeqCst) {
                    info!("Cancellation requested");
                }
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the current (or last) job with the recent event history
    pub fn status(&self) -> TaskStatus {
        let current = lock(&self.current);

        let Some(active) = current.as_ref() else {
            let mut status = TaskStatus::idle();
            status.recent_events = self.bus.snapshot();
            return status;
        };

        let job = lock(&active.job);
        TaskStatus {
            running: job.state.is_active(),
            job_id: Some(job.id),
            state: Some(job.state),
            progress: job.progress(),
            files: job.files.clone(),
            success_count: job.success_count,
            fail_count: job.fail_count,
            recent_events: self.bus.snapshot(),
            started_at: Some(job.started_at),
        }
    }

    /// Buffered events plus a live subscription continuing right after them
    pub fn subscribe(&self) -> (Vec<Event>, Subscription) {
        self.bus.subscribe()
    }

    /// Waits for the current job's runner to finish
    ///
    /// Returns None when there is no job or it was already awaited.
    pub async fn wait(&self) -> Option<JobState> {
        let handle = lock(&self.current)
            .as_mut()
            .and_then(|active| active.handle.take())?;

        match handle.await {
            Ok(state) => Some(state),
            Err(err) => {
                warn!("Job runner task failed: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::{FakeEmbedder, FakeTranscriber, Gate, backends, file_task};
    use lyric_core::domain::event::EventKind;
    use std::path::Path;
    use std::time::Duration;

    fn registry(transcriber: FakeTranscriber) -> JobRegistry {
        JobRegistry::new(
            EventBus::new(100, 100),
            Arc::new(BlockingWorker::spawn("test-worker").unwrap()),
            backends(transcriber, Arc::new(FakeEmbedder::default())),
        )
    }

    fn options() -> JobOptions {
        JobOptions {
            model: "tiny".to_string(),
            language: "zh".to_string(),
            prompt: String::new(),
            singer: String::new(),
            album: String::new(),
            cover_path: None,
        }
    }

    fn files(dir: &Path, names: &[&str]) -> Vec<FileTask> {
        names.iter().map(|name| file_task(dir, name)).collect()
    }

    #[test]
    fn test_idle_status() {
        let registry = registry(FakeTranscriber::default());

        let status = registry.status();
        assert!(!status.running);
        assert_eq!(status.job_id, None);
        assert!(status.recent_events.is_empty());
        assert!(!registry.cancel());
    }

    #[tokio::test]
    async fn test_start_rejects_empty_file_list() {
        let registry = registry(FakeTranscriber::default());
        assert_eq!(
            registry.start(Vec::new(), options()),
            Err(RegistryError::NoFiles)
        );
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (gate, control) = Gate::new("A.mp3");
        let registry = registry(FakeTranscriber::gated(gate));

        let first = registry
            .start(files(dir.path(), &["A.mp3", "B.mp3"]), options())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), control.started)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            registry.start(files(dir.path(), &["C.mp3"]), options()),
            Err(RegistryError::AlreadyRunning)
        );

        let status = registry.status();
        assert!(status.running);
        assert_eq!(status.job_id, Some(first));
        assert_eq!(status.files.len(), 2);
        assert_eq!(status.progress.unwrap().file, "A.mp3");

        control.release.send(()).unwrap();
        assert_eq!(registry.wait().await, Some(JobState::Completed));
        assert_eq!(registry.wait().await, None);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (gate, control) = Gate::new("A.mp3");
        let registry = registry(FakeTranscriber::gated(gate));

        registry
            .start(files(dir.path(), &["A.mp3", "B.mp3"]), options())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), control.started)
            .await
            .unwrap()
            .unwrap();

        assert!(registry.cancel());
        assert!(registry.cancel());

        control.release.send(()).unwrap();
        assert_eq!(registry.wait().await, Some(JobState::Cancelled));

        let status = registry.status();
        assert!(!status.running);
        assert_eq!(status.state, Some(JobState::Cancelled));
        let cancelled = status
            .recent_events
            .iter()
            .filter(|event| event.kind == EventKind::JobCancelled)
            .count();
        assert_eq!(cancelled, 1);

        // Nothing left to cancel
        assert!(!registry.cancel());
    }

    #[tokio::test]
    async fn test_finished_job_stays_visible_until_next_start() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(FakeTranscriber::default());

        let first = registry
            .start(files(dir.path(), &["A.mp3"]), options())
            .unwrap();
        assert_eq!(registry.wait().await, Some(JobState::Completed));

        let status = registry.status();
        assert!(!status.running);
        assert_eq!(status.job_id, Some(first));
        assert_eq!((status.success_count, status.fail_count), (1, 0));
        assert!(matches!(
            status.recent_events.last().map(|event| &event.kind),
            Some(EventKind::JobComplete { .. })
        ));

        let second = registry
            .start(files(dir.path(), &["B.mp3"]), options())
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.wait().await, Some(JobState::Completed));

        let events = registry.status().recent_events;
        assert_eq!(events.first().map(|event| event.seq), Some(1));
        assert!(events.iter().all(|event| !matches!(
            &event.kind,
            EventKind::Progress { file, .. } if file == "A.mp3"
        )));
    }

    #[tokio::test]
    async fn test_subscriber_sees_snapshot_then_live_events() {
        let dir = tempfile::tempdir().unwrap();
        let (gate, control) = Gate::new("B.mp3");
        let registry = registry(FakeTranscriber::gated(gate));

        registry
            .start(files(dir.path(), &["A.mp3", "B.mp3"]), options())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), control.started)
            .await
            .unwrap()
            .unwrap();

        let (snapshot, mut subscription) = registry.subscribe();
        assert!(!snapshot.is_empty());
        control.release.send(()).unwrap();

        let mut seqs: Vec<u64> = snapshot.iter().map(|event| event.seq).collect();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
                .await
                .unwrap()
                .unwrap();
            seqs.push(event.seq);
            if event.kind.is_terminal() {
                break;
            }
        }

        assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());
    }
}
