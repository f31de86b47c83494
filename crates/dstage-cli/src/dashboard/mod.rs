//! The interactive dashboard served over HTTP.
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use dstage_classifiers::config::RenderOptions;
use dstage_classifiers::models::ModelCache;

use crate::config::DashboardConfig;

/// Shared by every request. The classifier inside `cache` is loaded on first use.
pub struct AppState {
    pub cache: ModelCache,
    pub options: RenderOptions,
}

impl AppState {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            cache: ModelCache::new(&config.model_path),
            options: config.render_options(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/predict", post(handlers::predict_form))
        .route("/api/predict", post(handlers::predict_json))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind to the configured address and serve until the process is stopped.
pub async fn serve(config: DashboardConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(&config));

    // warm the cache; a failure here is retried on the first request
    if let Err(e) = state.cache.get_or_load() {
        log::warn!("Classifier not loaded at startup: {}", e);
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .context("Dashboard server stopped unexpectedly")?;
    Ok(())
}
