//! Offset detection endpoints

use axum::{extract::State, routing::post, Json, Router};

use dubalign_core::pcm::TempoAdjustment;

use crate::error::ApiResult;
use crate::models::{AlignRequest, AlignResponse, SegmentAlignRequest};
use crate::services::SegmentWindow;
use crate::AppState;

/// POST /align/detect
///
/// Detect the offset of the secondary track relative to the main
/// track. When both frame rates are given and differ, the secondary
/// track is tempo-scaled before correlation and the reported offset is
/// expressed in its original timeline.
pub async fn detect_alignment(
    State(state): State<AppState>,
    Json(request): Json<AlignRequest>,
) -> ApiResult<Json<AlignResponse>> {
    let tempo =
        TempoAdjustment::from_framerates(request.secondary_framerate, request.main_framerate);

    let response = state
        .alignment
        .detect(
            &request.main_wav_path,
            &request.secondary_wav_path,
            request.max_lag_ms,
            tempo,
            None,
        )
        .await?;
    Ok(Json(response))
}

/// POST /align/detect-segment
///
/// Detect the offset within one time window of both tracks. Used by
/// the UI to verify an alignment at several points of a long program.
pub async fn detect_alignment_segment(
    State(state): State<AppState>,
    Json(request): Json<SegmentAlignRequest>,
) -> ApiResult<Json<AlignResponse>> {
    let response = state
        .alignment
        .detect(
            &request.main_wav_path,
            &request.secondary_wav_path,
            request.max_lag_ms,
            TempoAdjustment::none(),
            Some(SegmentWindow {
                start_ms: request.start_time_ms,
                end_ms: request.end_time_ms,
            }),
        )
        .await?;
    Ok(Json(response))
}

/// Build alignment routes
pub fn align_routes() -> Router<AppState> {
    Router::new()
        .route("/align/detect", post(detect_alignment))
        .route("/align/detect-segment", post(detect_alignment_segment))
}
