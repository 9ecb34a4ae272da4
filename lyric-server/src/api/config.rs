//! Config API Handlers
//!
//! Reading and updating the persisted application config.

use axum::{Json, extract::State};
use lyric_core::domain::config::{AVAILABLE_MODELS, AppConfig};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json(state.config_store.load().await)
}

/// POST /api/config
/// Persist the config and return it
pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<AppConfig>,
) -> ApiResult<Json<AppConfig>> {
    state.config_store.save(&config).await?;
    tracing::info!("Config updated");
    Ok(Json(config))
}

/// GET /api/models
pub async fn list_models() -> Json<Vec<&'static str>> {
    Json(AVAILABLE_MODELS.to_vec())
}
