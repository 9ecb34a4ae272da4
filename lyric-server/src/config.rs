//! Server settings
//!
//! Process-level parameters: where to listen, where the persisted application
//! config lives, which external binaries to run, and how the event core is sized.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server settings
///
/// Loaded once at startup. Application settings that users edit at runtime
/// (directories, model, tags) live in the persisted `AppConfig` instead.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Path of the persisted application config (JSON)
    pub config_path: PathBuf,

    /// Directory holding `ggml-<model>.bin` whisper models
    pub models_dir: PathBuf,

    /// whisper.cpp command line binary
    pub whisper_bin: String,

    /// ffmpeg binary used for format conversion
    pub ffmpeg_bin: String,

    /// Threads handed to whisper.cpp
    pub whisper_threads: usize,

    /// Number of recent events retained for late subscribers
    pub event_buffer: usize,

    /// Per-subscriber channel capacity before a slow observer is dropped
    pub subscriber_capacity: usize,

    /// Inactivity interval after which streams emit a keepalive
    pub keepalive_interval: Duration,
}

impl Settings {
    /// Creates settings with defaults
    pub fn new(bind_addr: String, config_path: PathBuf) -> Self {
        Self {
            bind_addr,
            config_path,
            models_dir: PathBuf::from("models"),
            whisper_bin: "whisper-cli".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            whisper_threads: 8,
            event_buffer: 100,
            subscriber_capacity: 100,
            keepalive_interval: Duration::from_secs(30),
        }
    }

    /// Creates settings from environment variables
    ///
    /// Every variable is optional:
    /// - LYRIC_BIND_ADDR (default: 0.0.0.0:8000)
    /// - LYRIC_CONFIG_PATH (default: config.json)
    /// - LYRIC_MODELS_DIR (default: models)
    /// - LYRIC_WHISPER_BIN (default: whisper-cli)
    /// - LYRIC_FFMPEG_BIN (default: ffmpeg)
    /// - LYRIC_WHISPER_THREADS (default: 8)
    /// - LYRIC_EVENT_BUFFER (default: 100)
    /// - LYRIC_SUBSCRIBER_CAPACITY (default: 100)
    /// - LYRIC_KEEPALIVE_SECS (default: 30)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            bind_addr: lookup("LYRIC_BIND_ADDR").unwrap_or(defaults.bind_addr),
            config_path: lookup("LYRIC_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            models_dir: lookup("LYRIC_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            whisper_bin: lookup("LYRIC_WHISPER_BIN").unwrap_or(defaults.whisper_bin),
            ffmpeg_bin: lookup("LYRIC_FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            whisper_threads: parsed("LYRIC_WHISPER_THREADS")
                .map(|n| n as usize)
                .unwrap_or(defaults.whisper_threads),
            event_buffer: parsed("LYRIC_EVENT_BUFFER")
                .map(|n| n as usize)
                .unwrap_or(defaults.event_buffer),
            subscriber_capacity: parsed("LYRIC_SUBSCRIBER_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.subscriber_capacity),
            keepalive_interval: parsed("LYRIC_KEEPALIVE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.keepalive_interval),
        }
    }

    /// Validates the settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("bind_addr '{}' is not a valid socket address", self.bind_addr);
        }

        if self.config_path.as_os_str().is_empty() {
            anyhow::bail!("config_path cannot be empty");
        }

        if self.whisper_bin.is_empty() || self.ffmpeg_bin.is_empty() {
            anyhow::bail!("whisper_bin and ffmpeg_bin cannot be empty");
        }

        if self.whisper_threads == 0 {
            anyhow::bail!("whisper_threads must be greater than 0");
        }

        if self.event_buffer == 0 {
            anyhow::bail!("event_buffer must be greater than 0");
        }

        if self.subscriber_capacity == 0 {
            anyhow::bail!("subscriber_capacity must be greater than 0");
        }

        if self.keepalive_interval.is_zero() {
            anyhow::bail!("keepalive_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new("0.0.0.0:8000".to_string(), PathBuf::from("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.event_buffer, 100);
        assert_eq!(settings.subscriber_capacity, 100);
        assert_eq!(settings.keepalive_interval, Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.bind_addr = "not-an-addr".to_string();
        assert!(settings.validate().is_err());
        settings.bind_addr = "127.0.0.1:9000".to_string();

        settings.event_buffer = 0;
        assert!(settings.validate().is_err());
        settings.event_buffer = 10;

        settings.keepalive_interval = Duration::ZERO;
        assert!(settings.validate().is_err());
        settings.keepalive_interval = Duration::from_secs(5);

        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LYRIC_BIND_ADDR", "127.0.0.1:9999"),
            ("LYRIC_EVENT_BUFFER", "250"),
            ("LYRIC_KEEPALIVE_SECS", "soon"),
            ("LYRIC_MODELS_DIR", "/opt/models"),
        ]);

        let settings = Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.bind_addr, "127.0.0.1:9999");
        assert_eq!(settings.event_buffer, 250);
        assert_eq!(settings.keepalive_interval, Duration::from_secs(30));
        assert_eq!(settings.models_dir, PathBuf::from("/opt/models"));
        assert_eq!(settings.whisper_bin, "whisper-cli");
    }
}
