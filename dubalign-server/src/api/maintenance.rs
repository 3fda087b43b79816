//! Maintenance endpoints

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::error::ApiResult;
use crate::models::CacheClearResponse;
use crate::AppState;

/// POST /cache/clear
///
/// Drop every cached artifact (analysis WAVs, preview clips, scrub
/// frames). Subsequent requests regenerate what they need.
pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<CacheClearResponse>> {
    state.toolkit.cache().clear()?;
    info!("Artifact cache cleared");
    Ok(Json(CacheClearResponse { cleared: true }))
}

/// Build maintenance routes
pub fn maintenance_routes() -> Router<AppState> {
    Router::new().route("/cache/clear", post(clear_cache))
}
