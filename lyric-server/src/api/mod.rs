//! API Module
//!
//! HTTP API layer of the server.
//! Each submodule handles endpoints for a specific area.

pub mod config;
pub mod error;
pub mod files;
pub mod health;
pub mod task;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Settings;
use crate::service::config_store::ConfigStore;
use crate::service::registry::JobRegistry;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub config_store: Arc<ConfigStore>,
    pub settings: Arc<Settings>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Application config
        .route(
            "/api/config",
            get(config::get_config).post(config::update_config),
        )
        .route("/api/models", get(config::list_models))
        // Source files
        .route("/api/files", get(files::list_files))
        // Task lifecycle
        .route("/api/task/start", post(task::start_task))
        .route("/api/task/cancel", post(task::cancel_task))
        .route("/api/task/status", get(task::task_status))
        .route("/api/task/stream", get(task::task_stream))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
