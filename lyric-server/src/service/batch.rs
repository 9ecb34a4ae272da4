//! Batch runner
//!
//! Drives one job over its files, strictly one after another. For each file:
//! - transcribe (or skip when the lyric file exists), streaming lines as they come
//! - embed (or skip when the output exists, or when transcription left nothing to embed)
//! - report the file outcome, then honour a pending cancellation
//!
//! Every state change is published on the event bus while the job lock is held,
//! so status snapshots and the event stream never disagree.

use crate::backend::{Backends, EmbedRequest, TranscribeRequest};
use crate::service::event_bus::EventBus;
use crate::service::worker::{BlockingWorker, EventSink, WorkError};
use anyhow::Context;
use lyric_core::domain::config::AppConfig;
use lyric_core::domain::event::EventKind;
use lyric_core::domain::job::{FileTask, Job, JobState, Phase, PhaseStatus, TransitionError};
use lyric_core::lrc::{LyricLine, LyricTrack};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Per-job parameters taken from the application config at start time
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    pub model: String,
    pub language: String,
    pub prompt: String,
    pub singer: String,
    pub album: String,
    pub cover_path: Option<PathBuf>,
}

impl From<&AppConfig> for JobOptions {
    fn from(config: &AppConfig) -> Self {
        let cover = config.cover_path.trim();
        Self {
            model: config.model.clone(),
            language: config.language.clone(),
            prompt: config.prompt.clone(),
            singer: config.singer_name.clone(),
            album: config.album_name.clone(),
            cover_path: (!cover.is_empty()).then(|| PathBuf::from(cover)),
        }
    }
}

/// The worker went away; the job cannot make further progress
#[derive(Debug)]
struct WorkerLost;

/// Runs a single job to completion or cancellation
pub struct BatchRunner {
    job: Arc<Mutex<Job>>,
    cancel: Arc<AtomicBool>,
    bus: Arc<EventBus>,
    worker: Arc<BlockingWorker>,
    backends: Backends,
    options: JobOptions,
}

impl BatchRunner {
    pub fn new(
        job: Arc<Mutex<Job>>,
        cancel: Arc<AtomicBool>,
        bus: Arc<EventBus>,
        worker: Arc<BlockingWorker>,
        backends: Backends,
        options: JobOptions,
    ) -> Self {
        Self {
            job,
            cancel,
            bus,
            worker,
            backends,
            options,
        }
    }

    fn lock_job(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Processes every file and returns the terminal state
    pub async fn run(self) -> JobState {
        let (id, total) = {
            let mut job = self.lock_job();
            job.begin();
            (job.id, job.total())
        };

        info!("Job {} started with {} files", id, total);

        for index in 0..total {
            if self.process_file(index, total).await.is_err() {
                error!("Job {} lost its worker, stopping early", id);
                break;
            }

            if self.cancel.load(Ordering::SeqCst) {
                return self.finish(JobState::Cancelled);
            }
        }

        self.finish(JobState::Completed)
    }

    fn finish(&self, state: JobState) -> JobState {
        let mut job = self.lock_job();

        let kind = match state {
            JobState::Cancelled => EventKind::JobCancelled,
            _ => EventKind::JobComplete {
                success_count: job.success_count,
                fail_count: job.fail_count,
            },
        };
        self.bus.publish(kind);
        job.finish(state);

        info!(
            "Job {} finished as {:?}: {} succeeded, {} failed",
            job.id, state, job.success_count, job.fail_count
        );
        state
    }

    async fn process_file(&self, index: usize, total: usize) -> Result<(), WorkerLost> {
        let file = self.enter_phase(index, total, Phase::Transcribe);

        let mut outcome = self.run_phase(index, &file, Phase::Transcribe).await;

        if let Ok(transcribed) = outcome {
            let has_lyrics = self
                .backends
                .skip_policy
                .output_exists(Phase::Transcribe, &file);

            if transcribed == PhaseStatus::Failed && !has_lyrics {
                self.skip_phase(index, &file, Phase::Embed);
            } else {
                self.enter_phase(index, total, Phase::Embed);
                outcome = self.run_phase(index, &file, Phase::Embed).await;
            }
        }

        self.complete_file(index);
        outcome.map(|_| ())
    }

    /// Marks a phase as the active one and announces it
    fn enter_phase(&self, index: usize, total: usize, phase: Phase) -> FileTask {
        let mut job = self.lock_job();
        job.current = Some(index);
        job.active_phase = Some(phase);

        let file = job.files[index].clone();
        self.bus.publish(EventKind::Progress {
            current: index + 1,
            total,
            phase,
            file: file.name.clone(),
            duration: file.duration,
        });
        file
    }

    async fn run_phase(
        &self,
        index: usize,
        file: &FileTask,
        phase: Phase,
    ) -> Result<PhaseStatus, WorkerLost> {
        if self.backends.skip_policy.output_exists(phase, file) {
            info!("Skipping {} for {}: output exists", phase, file.name);
            self.skip_phase(index, file, phase);
            return Ok(PhaseStatus::Skipped);
        }

        log_transition(self.lock_job().files[index].transition(phase, PhaseStatus::Running));

        let result = match phase {
            Phase::Transcribe => self.transcribe(file).await,
            Phase::Embed => self.embed(file).await.map(|()| None),
        };

        let mut job = self.lock_job();
        let task = &mut job.files[index];

        let (status, lost) = match result {
            Ok(duration) => {
                if duration.is_some() {
                    task.duration = duration;
                }
                log_transition(task.transition(phase, PhaseStatus::Succeeded));
                (PhaseStatus::Succeeded, false)
            }
            Err(err) => {
                let message = err.to_string();
                warn!("{} failed for {}: {}", phase, file.name, message);
                log_transition(task.fail(phase, message.clone()));

                let fatal = err.is_fatal();
                self.bus.publish(EventKind::Error {
                    file: (!fatal).then(|| file.name.clone()),
                    message,
                });
                (PhaseStatus::Failed, fatal)
            }
        };

        self.bus.publish(EventKind::PhaseComplete {
            file: file.name.clone(),
            phase,
            status,
        });
        drop(job);

        if lost { Err(WorkerLost) } else { Ok(status) }
    }

    fn skip_phase(&self, index: usize, file: &FileTask, phase: Phase) {
        let mut job = self.lock_job();
        log_transition(job.files[index].transition(phase, PhaseStatus::Skipped));
        self.bus.publish(EventKind::PhaseComplete {
            file: file.name.clone(),
            phase,
            status: PhaseStatus::Skipped,
        });
    }

    fn complete_file(&self, index: usize) {
        let mut job = self.lock_job();
        let success = job.record_outcome(index);
        let file = &job.files[index];

        self.bus.publish(EventKind::FileComplete {
            file: file.name.clone(),
            success,
            message: if success { None } else { file.error.clone() },
        });

        info!(
            "File {}/{} {}: {}",
            index + 1,
            job.total(),
            file.name,
            if success { "done" } else { "failed" }
        );
    }

    /// Transcribes on the worker, writing the LRC file and streaming lines
    async fn transcribe(&self, file: &FileTask) -> Result<Option<f64>, WorkError> {
        let transcriber = Arc::clone(&self.backends.transcriber);
        let request = TranscribeRequest {
            source: file.source_path.clone(),
            model: self.options.model.clone(),
            language: self.options.language.clone(),
            prompt: self.options.prompt.clone(),
        };
        let lyric_path = file.lyric_path.clone();

        self.worker
            .run(
                move |sink: EventSink<LyricLine>| {
                    let transcript = transcriber
                        .transcribe(&request, &mut |line: &LyricLine| sink.emit(line.clone()))?;
                    write_lyrics(&lyric_path, &transcript.track)?;
                    Ok(transcript.duration)
                },
                |line: LyricLine| {
                    self.bus.publish(EventKind::LineProduced {
                        time: line.timestamp(),
                        text: line.text,
                    });
                },
            )
            .await
    }

    /// Embeds the file's LRC into a tagged output on the worker
    async fn embed(&self, file: &FileTask) -> Result<(), WorkError> {
        let embedder = Arc::clone(&self.backends.embedder);
        let lyric_path = file.lyric_path.clone();
        let mut request = EmbedRequest {
            source: file.source_path.clone(),
            output: file.output_path.clone(),
            track: LyricTrack::new(),
            title: title_of(&file.source_path),
            singer: self.options.singer.clone(),
            album: self.options.album.clone(),
            cover: self.options.cover_path.clone(),
        };

        self.worker
            .run(
                move |_sink: EventSink<()>| {
                    let text = fs::read_to_string(&lyric_path).with_context(|| {
                        format!("Failed to read lyrics {}", lyric_path.display())
                    })?;
                    request.track = LyricTrack::parse(&text);
                    embedder.embed(&request)
                },
                |_| {},
            )
            .await
    }
}

fn write_lyrics(path: &Path, track: &LyricTrack) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, track.render())
        .with_context(|| format!("Failed to write lyrics {}", path.display()))
}

fn title_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn log_transition(result: Result<(), TransitionError>) {
    if let Err(err) = result {
        error!("{}", err);
    }
}
