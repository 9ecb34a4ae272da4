//! Lyric HTTP Client
//!
//! A type-safe HTTP client for the Lyric Transcribe server API.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use lyric_client::{LyricClient, StreamItem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LyricClient::new("http://localhost:8000");
//!
//!     let started = client.start_task(vec!["song.mp3".to_string()]).await?;
//!     println!("Started job {}", started.job_id);
//!
//!     let mut events = client.stream_events(true).await?;
//!     while let Some(item) = events.next().await {
//!         if let StreamItem::Event(event) = item? {
//!             println!("{}", event.kind);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
pub mod error;
pub mod sse;
mod task;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use sse::StreamItem;
pub use task::EventStream;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Lyric server API
///
/// Methods are organized into groups:
/// - Task lifecycle (start, cancel, status, event stream)
/// - Configuration, models and source files
#[derive(Debug, Clone)]
pub struct LyricClient {
    /// Base URL of the server (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl LyricClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc. Avoid a total
    /// request timeout when using `stream_events`, which stays open for the
    /// whole job.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fail on non-success status codes with the server's error message
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Extracts `error` from a `{"error": "..."}` body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
