//! Configuration, model and file endpoints

use crate::LyricClient;
use crate::error::Result;
use lyric_core::domain::config::AppConfig;
use lyric_core::dto::files::FileInfo;

impl LyricClient {
    /// Get the persisted application config
    pub async fn get_config(&self) -> Result<AppConfig> {
        let url = format!("{}/api/config", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Replace the application config
    ///
    /// # Returns
    /// The config as stored by the server
    pub async fn update_config(&self, config: &AppConfig) -> Result<AppConfig> {
        let url = format!("{}/api/config", self.base_url);
        let response = self.client.post(&url).json(config).send().await?;

        self.handle_response(response).await
    }

    /// List available whisper model names
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/models", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List audio files in the source directory
    pub async fn list_files(&self) -> Result<Vec<FileInfo>> {
        let url = format!("{}/api/files", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
