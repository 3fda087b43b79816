//! Source analysis endpoints: track listing, extraction, waveforms

use std::path::Path;

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tokio::task;

use dubalign_core::{normalizer::normalize_file, pcm::TempoAdjustment, waveform::waveform_peaks};

use crate::error::{ApiError, ApiResult};
use crate::models::{
    ExtractRequest, ExtractResponse, TracksResponse, WaveformRequest, WaveformResponse,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    pub file_path: String,
}

/// POST /analyze/tracks
///
/// List the audio tracks of a media file.
pub async fn get_audio_tracks(
    State(state): State<AppState>,
    Query(query): Query<TracksQuery>,
) -> ApiResult<Json<TracksResponse>> {
    let tracks = state.toolkit.audio_tracks(&query.file_path).await?;
    Ok(Json(tracks))
}

/// POST /analyze/extract
///
/// Extract one audio track to a mono analysis WAV.
pub async fn extract_audio(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let response = state
        .toolkit
        .extract_audio(
            &request.file_path,
            request.track_index,
            state.config.analysis.sample_rate_hz,
        )
        .await?;
    Ok(Json(response))
}

/// POST /analyze/waveform
///
/// Summarize a WAV into display peaks.
pub async fn generate_waveform(
    State(state): State<AppState>,
    Json(request): Json<WaveformRequest>,
) -> ApiResult<Json<WaveformResponse>> {
    if !Path::new(&request.wav_path).is_file() {
        return Err(ApiError::NotFound(format!(
            "File not found: {}",
            request.wav_path
        )));
    }

    let samples_per_second = request
        .samples_per_second
        .unwrap_or(state.config.waveform_samples_per_second);
    if !samples_per_second.is_finite() || samples_per_second <= 0.0 {
        return Err(ApiError::BadRequest(format!(
            "samples_per_second must be positive, got {}",
            samples_per_second
        )));
    }

    let analysis = state.config.analysis;
    let wav_path = request.wav_path.clone();
    let peaks = task::spawn_blocking(move || -> Result<_, ApiError> {
        let track = normalize_file(Path::new(&wav_path), &analysis, TempoAdjustment::none())?;
        Ok(waveform_peaks(&track.pcm, samples_per_second))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("waveform task failed: {}", e)))??;

    Ok(Json(WaveformResponse {
        peaks: peaks.peaks,
        duration_seconds: peaks.duration_seconds,
        samples_per_second: peaks.samples_per_second,
    }))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze/tracks", post(get_audio_tracks))
        .route("/analyze/extract", post(extract_audio))
        .route("/analyze/waveform", post(generate_waveform))
}
