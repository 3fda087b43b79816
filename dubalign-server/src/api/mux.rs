//! Muxing endpoints: merge, preview, frame extraction

use axum::{extract::State, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::models::{
    FrameRequest, FrameResponse, MergeRequest, MergeResponse, PreviewRequest, PreviewResponse,
};
use crate::AppState;

/// POST /merge
///
/// Mux an aligned audio file into a video container as an additional
/// track, delayed by the detected offset.
pub async fn merge_audio(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<Json<MergeResponse>> {
    let response = state
        .toolkit
        .merge_audio(
            &request.video_path,
            &request.audio_path,
            request.offset_ms,
            &request.output_path,
            &request.language,
            request.title.as_deref(),
            request.modify_original,
        )
        .await?;
    Ok(Json(response))
}

/// POST /preview
///
/// Render a short clip with the candidate offset applied so the user
/// can audition it before committing to a merge.
pub async fn generate_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let response = state
        .toolkit
        .generate_preview(
            &request.video_path,
            &request.audio_path,
            request.start_time_seconds,
            request.duration_seconds,
            request.offset_ms,
            request.mute_main_audio,
            request.mute_secondary_audio,
        )
        .await?;
    Ok(Json(response))
}

/// POST /extract/frame
///
/// Extract a single video frame for the scrub UI.
pub async fn extract_frame(
    State(state): State<AppState>,
    Json(request): Json<FrameRequest>,
) -> ApiResult<Json<FrameResponse>> {
    let response = state
        .toolkit
        .extract_frame(&request.video_path, request.time_seconds)
        .await?;
    Ok(Json(response))
}

/// Build muxing routes
pub fn mux_routes() -> Router<AppState> {
    Router::new()
        .route("/merge", post(merge_audio))
        .route("/preview", post(generate_preview))
        .route("/extract/frame", post(extract_frame))
}
