//! Task DTOs for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::event::Event;
use crate::domain::job::{FileTask, JobState, Progress};

/// Request to start processing a batch of files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTask {
    /// File names relative to the configured source directory, in processing order
    pub files: Vec<String>,
}

/// Response to a successful start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTaskResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub files_count: usize,
}

/// Response to a cancel request
///
/// `success` reports whether an active job was signalled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub success: bool,
}

/// Status snapshot used to recover state after a refresh or reconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub files: Vec<FileTask>,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub fail_count: usize,
    /// Most recent buffered events, oldest first
    #[serde(default)]
    pub recent_events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TaskStatus {
    /// Status reported when no job has run since the process started
    pub fn idle() -> Self {
        Self {
            running: false,
            job_id: None,
            state: None,
            progress: None,
            files: Vec::new(),
            success_count: 0,
            fail_count: 0,
            recent_events: Vec::new(),
            started_at: None,
        }
    }
}
