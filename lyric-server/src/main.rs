use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod backend;
pub mod config;
pub mod service;

use backend::{Backends, ExistingOutputs, Ffmpeg, Id3Embedder, WhisperCli};
use config::Settings;
use service::config_store::ConfigStore;
use service::event_bus::EventBus;
use service::registry::JobRegistry;
use service::worker::BlockingWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lyric_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lyric Server...");

    let settings = Settings::from_env();
    settings.validate().context("Invalid server settings")?;

    tracing::info!("Config file: {}", settings.config_path.display());
    tracing::info!("Models directory: {}", settings.models_dir.display());

    let ffmpeg = Ffmpeg::new(settings.ffmpeg_bin.clone());
    let backends = Backends {
        transcriber: Arc::new(WhisperCli::new(
            settings.whisper_bin.clone(),
            settings.models_dir.clone(),
            settings.whisper_threads,
            ffmpeg.clone(),
        )),
        embedder: Arc::new(Id3Embedder::new(ffmpeg)),
        skip_policy: Arc::new(ExistingOutputs),
    };

    let worker = BlockingWorker::spawn("lyric-worker").context("Failed to spawn worker thread")?;
    let bus = EventBus::new(settings.event_buffer, settings.subscriber_capacity);
    let registry = JobRegistry::new(bus, Arc::new(worker), backends);

    let state = api::AppState {
        registry: Arc::new(registry),
        config_store: Arc::new(ConfigStore::new(settings.config_path.clone())),
        settings: Arc::new(settings.clone()),
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", settings.bind_addr);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
