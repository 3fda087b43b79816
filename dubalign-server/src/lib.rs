//! dubalign-server library interface
//!
//! Exposes the router and state for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{AlignmentService, ArtifactCache, MediaToolkit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: ServiceConfig,
    /// ffmpeg/ffprobe wrapper with the artifact cache
    pub toolkit: MediaToolkit,
    /// Alignment orchestration over the engine
    pub alignment: AlignmentService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> std::io::Result<Self> {
        let cache = ArtifactCache::open(&config.temp_dir)?;
        let alignment = AlignmentService::new(&config);
        Ok(Self {
            config,
            toolkit: MediaToolkit::new(cache),
            alignment,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .merge(api::align_routes())
        .merge(api::mux_routes())
        .merge(api::maintenance_routes());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
