//! Task API Handlers
//!
//! Starting, cancelling and observing the batch job.

use axum::{
    Json,
    extract::{Query, State},
    response::{
        IntoResponse,
        sse::{self, Sse},
    },
};
use futures_util::{Stream, StreamExt, stream};
use lyric_core::domain::event::Event;
use lyric_core::dto::task::{CancelTaskResponse, StartTask, StartTaskResponse, TaskStatus};
use serde::Deserialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::batch::JobOptions;
use crate::service::event_bus::{Delivery, Subscription};
use crate::service::files::build_file_tasks;

// =============================================================================
// Task Lifecycle Endpoints
// =============================================================================

/// POST /api/task/start
/// Start a job over the selected source files
pub async fn start_task(
    State(state): State<AppState>,
    Json(req): Json<StartTask>,
) -> ApiResult<Json<StartTaskResponse>> {
    let config = state.config_store.load().await;

    let missing = config.missing_directories();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Please configure: {}",
            missing.join(", ")
        )));
    }

    let options = JobOptions::from(&config);
    let files = tokio::task::spawn_blocking(move || build_file_tasks(&config, &req.files))
        .await
        .map_err(|e| ApiError::InternalError(format!("File lookup failed: {}", e)))?;

    if files.is_empty() {
        return Err(ApiError::BadRequest("No valid files to process".to_string()));
    }

    let files_count = files.len();
    let job_id = state.registry.start(files, options)?;

    tracing::info!("Task {} started with {} files", job_id, files_count);

    Ok(Json(StartTaskResponse {
        success: true,
        job_id,
        files_count,
    }))
}

/// POST /api/task/cancel
/// Request cancellation; the file in flight finishes first
pub async fn cancel_task(State(state): State<AppState>) -> Json<CancelTaskResponse> {
    Json(CancelTaskResponse {
        success: state.registry.cancel(),
    })
}

/// GET /api/task/status
pub async fn task_status(State(state): State<AppState>) -> Json<TaskStatus> {
    Json(state.registry.status())
}

// =============================================================================
// Event Stream
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Replay the buffered events before live ones
    #[serde(default)]
    pub replay: bool,
}

/// GET /api/task/stream
/// Server-sent events of the current job, ending after its terminal event
pub async fn task_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let (snapshot, subscription) = state.registry.subscribe();
    tracing::debug!(
        "Stream subscriber {} connected (replay: {})",
        subscription.id(),
        query.replay
    );

    let backlog = if query.replay { snapshot } else { Vec::new() };
    let deliveries = delivery_stream(backlog, subscription, state.settings.keepalive_interval);

    let events = deliveries.map(|delivery| {
        Ok::<_, Infallible>(match delivery {
            Delivery::Event(event) => to_sse(&event),
            _ => sse::Event::default().comment("keepalive"),
        })
    });

    ([("x-accel-buffering", "no")], Sse::new(events))
}

struct StreamState {
    backlog: VecDeque<Event>,
    subscription: Subscription,
    keepalive: Duration,
    finished: bool,
}

/// Backlog first, then live events and keepalives, until a terminal event or
/// until the bus drops the subscriber
fn delivery_stream(
    backlog: Vec<Event>,
    subscription: Subscription,
    keepalive: Duration,
) -> impl Stream<Item = Delivery> {
    let state = StreamState {
        backlog: backlog.into(),
        subscription,
        keepalive,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        let delivery = match state.backlog.pop_front() {
            Some(event) => Delivery::Event(event),
            None => state.subscription.next_or_keepalive(state.keepalive).await,
        };

        match delivery {
            Delivery::Closed => None,
            Delivery::Event(ref event) => {
                state.finished = event.kind.is_terminal();
                Some((delivery, state))
            }
            Delivery::Keepalive => Some((delivery, state)),
        }
    })
}

fn to_sse(event: &Event) -> sse::Event {
    let frame = sse::Event::default()
        .event(event.kind.name())
        .id(event.seq.to_string());

    match serde_json::to_string(event) {
        Ok(json) => frame.data(json),
        Err(e) => {
            tracing::warn!("Failed to serialize event {}: {}", event.seq, e);
            frame.comment("unserializable event")
        }
    }
}
