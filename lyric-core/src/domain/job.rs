//! Job domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Processing stage applied to every file, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Transcribe,
    Embed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Transcribe => write!(f, "transcribe"),
            Phase::Embed => write!(f, "embed"),
        }
    }
}

/// Status of one phase of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PhaseStatus::Succeeded | PhaseStatus::Failed | PhaseStatus::Skipped
        )
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_transition_to(self, next: PhaseStatus) -> bool {
        use PhaseStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Skipped)
        )
    }
}

/// Rejected phase status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {phase} transition for '{file}': {from:?} -> {to:?}")]
pub struct TransitionError {
    pub file: String,
    pub phase: Phase,
    pub from: PhaseStatus,
    pub to: PhaseStatus,
}

/// One file's progress through the transcribe and embed phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    /// Source file name, used as the display name in events
    pub name: String,
    pub source_path: PathBuf,
    pub lyric_path: PathBuf,
    pub output_path: PathBuf,
    pub transcribe: PhaseStatus,
    pub embed: PhaseStatus,
    pub error: Option<String>,
    /// Audio duration in seconds, once known
    pub duration: Option<f64>,
}

impl FileTask {
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        lyric_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            lyric_path: lyric_path.into(),
            output_path: output_path.into(),
            transcribe: PhaseStatus::Pending,
            embed: PhaseStatus::Pending,
            error: None,
            duration: None,
        }
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        match phase {
            Phase::Transcribe => self.transcribe,
            Phase::Embed => self.embed,
        }
    }

    /// Moves a phase forward, rejecting backward or repeated transitions
    pub fn transition(&mut self, phase: Phase, next: PhaseStatus) -> Result<(), TransitionError> {
        let current = self.status(phase);
        if !current.can_transition_to(next) {
            return Err(TransitionError {
                file: self.name.clone(),
                phase,
                from: current,
                to: next,
            });
        }

        match phase {
            Phase::Transcribe => self.transcribe = next,
            Phase::Embed => self.embed = next,
        }
        Ok(())
    }

    /// Records a phase failure along with its message
    pub fn fail(&mut self, phase: Phase, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(phase, PhaseStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// True when no phase failed
    pub fn success(&self) -> bool {
        self.transcribe != PhaseStatus::Failed && self.embed != PhaseStatus::Failed
    }

    pub fn is_finished(&self) -> bool {
        self.transcribe.is_terminal() && self.embed.is_terminal()
    }
}

/// Overall job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl JobState {
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

/// Snapshot of where a job currently is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// 1-based index of the current file
    pub current: usize,
    pub total: usize,
    pub phase: Phase,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// One batch run over an ordered list of files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub files: Vec<FileTask>,
    pub state: JobState,
    pub success_count: usize,
    pub fail_count: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Index of the file being processed
    pub current: Option<usize>,
    pub active_phase: Option<Phase>,
}

impl Job {
    pub fn new(files: Vec<FileTask>) -> Self {
        Self {
            id: Uuid::new_v4(),
            files,
            state: JobState::Pending,
            success_count: 0,
            fail_count: 0,
            started_at: chrono::Utc::now(),
            finished_at: None,
            current: None,
            active_phase: None,
        }
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// Marks the job as running. Only valid from Pending.
    pub fn begin(&mut self) -> bool {
        if self.state != JobState::Pending {
            return false;
        }
        self.state = JobState::Running;
        true
    }

    /// Moves the job into a terminal state
    pub fn finish(&mut self, state: JobState) {
        debug_assert!(!state.is_active());
        if self.state.is_active() {
            self.state = state;
            self.finished_at = Some(chrono::Utc::now());
            self.active_phase = None;
        }
    }

    /// Records the outcome of a finished file in the aggregate counters
    pub fn record_outcome(&mut self, index: usize) -> bool {
        let success = self.files[index].success();
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        success
    }

    pub fn progress(&self) -> Option<Progress> {
        let index = self.current?;
        let file = self.files.get(index)?;
        Some(Progress {
            current: index + 1,
            total: self.total(),
            phase: self.active_phase.unwrap_or(Phase::Transcribe),
            file: file.name.clone(),
            duration: file.duration,
        })
    }
}
