//! Source file discovery
//!
//! Lists the audio files in the configured source directory and maps selected
//! names to file tasks with their lyric and output targets.

use lyric_core::domain::config::{AppConfig, is_audio_file};
use lyric_core::domain::job::FileTask;
use lyric_core::dto::files::FileInfo;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lyric and output targets for a source file name
fn targets(config: &AppConfig, name: &str) -> (PathBuf, PathBuf) {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    (
        Path::new(&config.lyric_dir).join(format!("{}.lrc", stem)),
        Path::new(&config.output_dir).join(format!("{}.mp3", stem)),
    )
}

/// Audio files in the source directory, sorted by name
pub fn list_source_files(config: &AppConfig) -> Vec<FileInfo> {
    let source_dir = Path::new(&config.source_dir);
    if config.source_dir.trim().is_empty() || !source_dir.is_dir() {
        return Vec::new();
    }

    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Failed to list {}: {}", source_dir.display(), err);
            return Vec::new();
        }
    };

    let mut files: Vec<FileInfo> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_audio_file(&entry.path()))
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let (lyric, output) = targets(config, &name);
            FileInfo {
                has_lyric: lyric.exists(),
                has_output: output.exists(),
                size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
                name,
            }
        })
        .collect();

    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

/// Builds file tasks for the selected names, in request order
///
/// Names that are not plain file names, not audio, or missing from the source
/// directory are dropped.
pub fn build_file_tasks(config: &AppConfig, names: &[String]) -> Vec<FileTask> {
    names
        .iter()
        .filter(|name| {
            let plain = is_plain_name(name);
            if !plain {
                warn!("Rejecting file name {:?}", name);
            }
            plain
        })
        .filter_map(|name| {
            let source = Path::new(&config.source_dir).join(name);
            if !source.is_file() || !is_audio_file(&source) {
                debug!("Skipping {}: not an audio file in the source directory", name);
                return None;
            }
            let (lyric, output) = targets(config, name);
            Some(FileTask::new(name.clone(), source, lyric, output))
        })
        .collect()
}

/// A single path component, so requests cannot escape the source directory
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
