//! Task-related API endpoints

use crate::LyricClient;
use crate::error::Result;
use crate::sse::{SseParser, StreamItem};
use futures_util::{Stream, StreamExt, stream};
use lyric_core::dto::task::{CancelTaskResponse, StartTask, StartTaskResponse, TaskStatus};
use std::collections::VecDeque;
use std::pin::Pin;

/// Live task events, ending when the server closes the stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamItem>> + Send>>;

impl LyricClient {
    // =============================================================================
    // Task Lifecycle
    // =============================================================================

    /// Start a job over files from the configured source directory
    ///
    /// # Arguments
    /// * `files` - File names, in processing order
    ///
    /// # Returns
    /// The job id and the number of files accepted; a 409 API error when a job
    /// is already running
    pub async fn start_task(&self, files: Vec<String>) -> Result<StartTaskResponse> {
        let url = format!("{}/api/task/start", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&StartTask { files })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Request cancellation of the running job
    ///
    /// `success` in the response tells whether a job was signalled.
    pub async fn cancel_task(&self) -> Result<CancelTaskResponse> {
        let url = format!("{}/api/task/cancel", self.base_url);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get the current (or last) job status
    pub async fn task_status(&self) -> Result<TaskStatus> {
        let url = format!("{}/api/task/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Event Stream
    // =============================================================================

    /// Open the server-sent event stream
    ///
    /// # Arguments
    /// * `replay` - Start with the server's buffered recent events
    pub async fn stream_events(&self, replay: bool) -> Result<EventStream> {
        let url = format!("{}/api/task/stream", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("replay", replay)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = self.check_status(response).await?;

        tracing::debug!("Event stream opened (replay: {})", replay);

        let state = (
            response.bytes_stream().boxed(),
            SseParser::new(),
            VecDeque::<Result<StreamItem>>::new(),
        );

        let items = stream::unfold(state, |(mut bytes, mut parser, mut pending)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (bytes, parser, pending)));
                }

                match bytes.next().await? {
                    Ok(chunk) => {
                        for frame in parser.feed(&chunk) {
                            if let Some(item) = frame.into_item().transpose() {
                                pending.push_back(item);
                            }
                        }
                    }
                    Err(e) => return Some((Err(e.into()), (bytes, parser, pending))),
                }
            }
        });

        Ok(Box::pin(items))
    }
}
