//! File API Handlers

use axum::{Json, extract::State};
use lyric_core::dto::files::FileInfo;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::files::list_source_files;

/// GET /api/files
/// Audio files in the source directory with their lyric/output state
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<FileInfo>>> {
    let config = state.config_store.load().await;

    let files = tokio::task::spawn_blocking(move || list_source_files(&config))
        .await
        .map_err(|e| ApiError::InternalError(format!("File listing failed: {}", e)))?;

    Ok(Json(files))
}
