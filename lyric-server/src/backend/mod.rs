//! Backends
//!
//! Blocking collaborators the batch runner drives on the dedicated worker:
//! transcription, tag embedding, and the policy deciding which phases can be
//! skipped because their output already exists.

mod ffmpeg;
mod id3_tagger;
mod whisper_cli;

pub use ffmpeg::Ffmpeg;
pub use id3_tagger::Id3Embedder;
pub use whisper_cli::WhisperCli;

use lyric_core::domain::job::{FileTask, Phase};
use lyric_core::lrc::{LyricLine, LyricTrack};
use std::path::PathBuf;
use std::sync::Arc;

/// Input of one transcription
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    pub source: PathBuf,
    pub model: String,
    pub language: String,
    pub prompt: String,
}

/// Output of one transcription
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub track: LyricTrack,
    /// Estimated audio duration in seconds
    pub duration: Option<f64>,
}

/// Turns audio into timed lyric lines
///
/// Implementations block until the whole file is transcribed and call
/// `on_line` for each recognized line as soon as it is available.
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        request: &TranscribeRequest,
        on_line: &mut dyn FnMut(&LyricLine),
    ) -> anyhow::Result<Transcript>;
}

/// Input of one tag embedding
#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub track: LyricTrack,
    pub title: String,
    pub singer: String,
    pub album: String,
    pub cover: Option<PathBuf>,
}

/// Writes a tagged output file carrying synchronized lyrics and metadata
pub trait TagEmbedder: Send + Sync {
    fn embed(&self, request: &EmbedRequest) -> anyhow::Result<()>;
}

/// Decides whether a phase's output is already present
pub trait SkipPolicy: Send + Sync {
    fn output_exists(&self, phase: Phase, file: &FileTask) -> bool;
}

/// Skips a phase when its target file exists on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistingOutputs;

impl SkipPolicy for ExistingOutputs {
    fn output_exists(&self, phase: Phase, file: &FileTask) -> bool {
        match phase {
            Phase::Transcribe => file.lyric_path.exists(),
            Phase::Embed => file.output_path.exists(),
        }
    }
}

/// The set of collaborators a job runs with
#[derive(Clone)]
pub struct Backends {
    pub transcriber: Arc<dyn Transcriber>,
    pub embedder: Arc<dyn TagEmbedder>,
    pub skip_policy: Arc<dyn SkipPolicy>,
}
