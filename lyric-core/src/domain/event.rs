//! Event domain types
//!
//! Events are immutable facts about job progress. The server assigns each one
//! a sequence number when it is published; observers receive them in that order.

use serde::{Deserialize, Serialize};

use crate::domain::job::{Phase, PhaseStatus};

/// A published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Strictly increasing, gap-free within a job, starting at 1
    pub seq: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub kind: EventKind,
}

/// Payload of an event, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    Progress {
        current: usize,
        total: usize,
        phase: Phase,
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    LineProduced {
        /// LRC timestamp, e.g. `[01:02.50]`
        time: String,
        text: String,
    },
    PhaseComplete {
        file: String,
        phase: Phase,
        status: PhaseStatus,
    },
    FileComplete {
        file: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    JobComplete {
        success_count: usize,
        fail_count: usize,
    },
    JobCancelled,
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        message: String,
    },
}

impl EventKind {
    /// Wire name of the kind, used as the SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Progress { .. } => "progress",
            EventKind::LineProduced { .. } => "line_produced",
            EventKind::PhaseComplete { .. } => "phase_complete",
            EventKind::FileComplete { .. } => "file_complete",
            EventKind::JobComplete { .. } => "job_complete",
            EventKind::JobCancelled => "job_cancelled",
            EventKind::Error { .. } => "error",
        }
    }

    /// Whether this event ends a job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::JobComplete { .. } | EventKind::JobCancelled)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Progress {
                current,
                total,
                phase,
                file,
                ..
            } => write!(f, "[{}/{}] {} {}", current, total, phase, file),
            EventKind::LineProduced { time, text } => write!(f, "{}{}", time, text),
            EventKind::PhaseComplete {
                file,
                phase,
                status,
            } => write!(f, "{} {}: {:?}", file, phase, status),
            EventKind::FileComplete {
                file,
                success,
                message,
            } => match (success, message) {
                (true, _) => write!(f, "{} done", file),
                (false, Some(msg)) => write!(f, "{} failed: {}", file, msg),
                (false, None) => write!(f, "{} failed", file),
            },
            EventKind::JobComplete {
                success_count,
                fail_count,
            } => write!(
                f,
                "job complete: {} succeeded, {} failed",
                success_count, fail_count
            ),
            EventKind::JobCancelled => write!(f, "job cancelled"),
            EventKind::Error {
                file: Some(file),
                message,
            } => write!(f, "error in {}: {}", file, message),
            EventKind::Error { file: None, message } => write!(f, "error: {}", message),
        }
    }
}
