//! File listing DTOs

use serde::{Deserialize, Serialize};

/// A source audio file and what already exists for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub has_lyric: bool,
    pub has_output: bool,
    pub size_bytes: u64,
}

impl FileInfo {
    /// Both the lyric and the tagged output already exist
    pub fn is_done(&self) -> bool {
        self.has_lyric && self.has_output
    }
}
