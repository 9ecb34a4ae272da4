//! Application configuration domain types

use serde::{Deserialize, Serialize};

/// Whisper model names accepted by the transcription backend
pub const AVAILABLE_MODELS: &[&str] = &[
    "tiny",
    "tiny.en",
    "base",
    "base.en",
    "small",
    "small.en",
    "medium",
    "medium.en",
    "large-v1",
    "large-v2",
    "large-v3",
    "large-v3-turbo",
];

/// Audio file extensions picked up from the source directory
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "mp4", "wav", "flac", "ogg", "aac"];

/// User-editable application settings
///
/// Persisted as JSON by the server and edited through the config endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_dir: String,
    pub lyric_dir: String,
    pub output_dir: String,

    pub model: String,
    pub language: String,
    pub prompt: String,

    pub singer_name: String,
    pub album_name: String,
    pub cover_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_dir: String::new(),
            lyric_dir: String::new(),
            output_dir: String::new(),
            model: "large-v3-turbo".to_string(),
            language: "zh".to_string(),
            prompt: "歌词 简体中文".to_string(),
            singer_name: String::new(),
            album_name: String::new(),
            cover_path: String::new(),
        }
    }
}

impl AppConfig {
    /// Names of the required directories that are not configured
    pub fn missing_directories(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.source_dir.trim().is_empty() {
            missing.push("source_dir");
        }
        if self.lyric_dir.trim().is_empty() {
            missing.push("lyric_dir");
        }
        if self.output_dir.trim().is_empty() {
            missing.push("output_dir");
        }
        missing
    }
}

/// Whether the path has one of the supported audio extensions
pub fn is_audio_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.model, "large-v3-turbo");
        assert_eq!(config.language, "zh");
        assert_eq!(
            config.missing_directories(),
            vec!["source_dir", "lyric_dir", "output_dir"]
        );
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"source_dir": "/music", "language": "en"}"#).unwrap();
        assert_eq!(config.source_dir, "/music");
        assert_eq!(config.language, "en");
        assert_eq!(config.model, "large-v3-turbo");
        assert_eq!(config.missing_directories(), vec!["lyric_dir", "output_dir"]);
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("/a/song.MP3")));
        assert!(is_audio_file(Path::new("track.flac")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }
}
