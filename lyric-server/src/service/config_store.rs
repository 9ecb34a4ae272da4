//! Config Store
//!
//! Loads and saves the user-editable `AppConfig` as a JSON file.

use lyric_core::domain::config::AppConfig;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Config persistence error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON file backed config store
pub struct ConfigStore {
    path: PathBuf,
    /// Serializes writers so concurrent saves cannot interleave
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the config, falling back to defaults when the file is missing or unreadable
    pub async fn load(&self) -> AppConfig {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                return AppConfig::default();
            }
            Err(err) => {
                warn!(
                    "Failed to read config {}: {}. Using defaults",
                    self.path.display(),
                    err
                );
                return AppConfig::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(
                "Config {} is not valid JSON: {}. Using defaults",
                self.path.display(),
                err
            );
            AppConfig::default()
        })
    }

    /// Writes the config as pretty JSON
    ///
    /// The file is replaced atomically, so concurrent loads see either the old
    /// or the new config, never a partial write.
    pub async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config)?;

        let _guard = self.write_lock.lock().await;
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(json.as_bytes())?;
            staged.as_file().sync_all()?;
            staged.persist(&path).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Config saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));

        assert_eq!(store.load().await, AppConfig::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.json"));

        let config = AppConfig {
            source_dir: "/music".to_string(),
            singer_name: "邓丽君".to_string(),
            ..Default::default()
        };
        store.save(&config).await.unwrap();

        assert_eq!(store.load().await, config);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"source_dir\": \"/music\""));
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::new(path);
        assert_eq!(store.load().await, AppConfig::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_loads_never_see_a_partial_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(ConfigStore::new(dir.path().join("config.json")));
        let config = AppConfig {
            source_dir: "/music".to_string(),
            prompt: "歌词".repeat(500),
            ..Default::default()
        };
        store.save(&config).await.unwrap();

        let writer = {
            let store = store.clone();
            let config = config.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    store.save(&config).await.unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                let mut loaded = Vec::new();
                for _ in 0..200 {
                    loaded.push(store.load().await);
                }
                loaded
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            for loaded in reader.await.unwrap() {
                assert_eq!(loaded, config);
            }
        }

        // Only the config file is left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
