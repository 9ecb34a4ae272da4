//! Server-sent events decoding
//!
//! Incremental parser for the `text/event-stream` format: fields accumulate
//! until a blank line closes the frame. Chunks may split lines (and UTF-8
//! sequences) anywhere.

use crate::error::{ClientError, Result};
use lyric_core::domain::event::Event;

/// One item of the task event stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(Event),
    /// The server signalled that the connection is alive but idle
    Keepalive,
}

/// A raw SSE frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
    pub comment: Option<String>,
}

impl SseFrame {
    /// Decodes the frame; comment-only frames are keepalives
    pub fn into_item(self) -> Result<Option<StreamItem>> {
        if self.data.is_empty() {
            return Ok(self.comment.map(|_| StreamItem::Keepalive));
        }

        serde_json::from_str(&self.data)
            .map(|event| Some(StreamItem::Event(event)))
            .map_err(|e| ClientError::ParseError(format!("Invalid event payload: {}", e)))
    }
}

/// Incremental SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    frame: SseFrame,
    has_fields: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.has_fields {
                    frames.push(std::mem::take(&mut self.frame));
                    self.has_fields = false;
                }
                continue;
            }

            self.has_fields = true;
            self.apply(line);
        }
        frames
    }

    fn apply(&mut self, line: &str) {
        if let Some(comment) = line.strip_prefix(':') {
            self.frame.comment = Some(comment.trim().to_string());
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.frame.event = Some(value.to_string()),
            "id" => self.frame.id = Some(value.to_string()),
            "data" => {
                if !self.frame.data.is_empty() {
                    self.frame.data.push('\n');
                }
                self.frame.data.push_str(value);
            }
            _ => {}
        }
    }
}
