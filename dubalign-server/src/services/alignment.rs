//! Alignment orchestration
//!
//! Bridges the HTTP handlers to the synchronous engine: decodes both
//! tracks on the blocking pool in parallel, runs feature extraction and
//! correlation, and converts timeouts into the inconclusive result
//! instead of an error. Long sources make correlation expensive; the
//! UI treats a zero-confidence answer as "try manual alignment", which
//! is strictly better than a hung request.

use std::path::Path;
use std::time::Duration;

use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dubalign_core::{
    align::{estimate_offset, AlignablePair},
    normalizer::normalize_file,
    onset::onset_envelope,
    params::{AlignmentParams, AnalysisParams},
    pcm::TempoAdjustment,
    AlignmentResult, NormalizedTrack,
};

use crate::config::ServiceConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::AlignResponse;

/// Optional time window restricting the correlation to one segment
#[derive(Debug, Clone, Copy)]
pub struct SegmentWindow {
    pub start_ms: f64,
    pub end_ms: f64,
}

#[derive(Debug, Clone)]
pub struct AlignmentService {
    analysis: AnalysisParams,
    default_max_lag_ms: f64,
    timeout: Duration,
}

impl AlignmentService {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            analysis: config.analysis,
            default_max_lag_ms: config.default_max_lag_ms,
            timeout: config.alignment_timeout,
        }
    }

    /// Detect the offset of `secondary_wav_path` relative to
    /// `main_wav_path`
    ///
    /// A timeout or a degenerate correlation surface both produce the
    /// inconclusive result (offset 0, confidence 0), never an error.
    pub async fn detect(
        &self,
        main_wav_path: &str,
        secondary_wav_path: &str,
        max_lag_ms: Option<f64>,
        tempo: TempoAdjustment,
        window: Option<SegmentWindow>,
    ) -> ApiResult<AlignResponse> {
        require_file(main_wav_path)?;
        require_file(secondary_wav_path)?;

        let bound = max_lag_ms.unwrap_or(self.default_max_lag_ms);
        let alignment = AlignmentParams::new(bound)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if let Some(window) = window {
            if !(window.start_ms >= 0.0 && window.end_ms > window.start_ms) {
                return Err(ApiError::BadRequest(format!(
                    "invalid segment window [{}, {}) ms",
                    window.start_ms, window.end_ms
                )));
            }
        }

        // The pipeline runs in its own task so a timeout does not leave
        // detached blocking work queueing up a correlation nobody wants;
        // the token is checked between the decode and correlate stages.
        let cancel = CancellationToken::new();
        let pipeline = tokio::spawn(run_pipeline(
            main_wav_path.to_string(),
            secondary_wav_path.to_string(),
            self.analysis,
            alignment,
            tempo,
            window,
            cancel.clone(),
        ));

        let result = match tokio::time::timeout(self.timeout, pipeline).await {
            Ok(joined) => {
                joined.map_err(|e| ApiError::Internal(format!("alignment task failed: {}", e)))??
            }
            Err(_) => {
                cancel.cancel();
                warn!(
                    main = main_wav_path,
                    secondary = secondary_wav_path,
                    timeout_seconds = self.timeout.as_secs(),
                    "Alignment timed out; reporting inconclusive"
                );
                return Ok(to_response(AlignmentResult::inconclusive(), tempo));
            }
        };

        info!(
            main = main_wav_path,
            secondary = secondary_wav_path,
            offset_ms = result.offset_ms,
            confidence = result.confidence,
            tempo_applied = tempo.applied,
            "Alignment detected"
        );

        Ok(to_response(result, tempo))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    main_path: String,
    secondary_path: String,
    analysis: AnalysisParams,
    alignment: AlignmentParams,
    tempo: TempoAdjustment,
    window: Option<SegmentWindow>,
    cancel: CancellationToken,
) -> ApiResult<AlignmentResult> {
    let (main, secondary) = tokio::try_join!(
        decode_track(main_path, analysis, TempoAdjustment::none()),
        decode_track(secondary_path, analysis, tempo),
    )?;

    // Cooperative checkpoint: after a timeout there is no reader for
    // the correlation, so skip the expensive stage entirely
    if cancel.is_cancelled() {
        debug!("Alignment cancelled after decode stage");
        return Ok(AlignmentResult::inconclusive());
    }

    task::spawn_blocking(move || correlate(&main, &secondary, &analysis, &alignment, window))
        .await
        .map_err(|e| ApiError::Internal(format!("alignment task failed: {}", e)))
}

async fn decode_track(
    path: String,
    analysis: AnalysisParams,
    tempo: TempoAdjustment,
) -> ApiResult<NormalizedTrack> {
    task::spawn_blocking(move || normalize_file(Path::new(&path), &analysis, tempo))
        .await
        .map_err(|e| ApiError::Internal(format!("decode task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn correlate(
    main: &NormalizedTrack,
    secondary: &NormalizedTrack,
    analysis: &AnalysisParams,
    alignment: &AlignmentParams,
    window: Option<SegmentWindow>,
) -> AlignmentResult {
    let mut env_main = onset_envelope(&main.pcm, analysis);
    let mut env_secondary = onset_envelope(&secondary.pcm, analysis);

    if let Some(window) = window {
        env_main = env_main.slice_ms(window.start_ms, window.end_ms);
        env_secondary = env_secondary.slice_ms(window.start_ms, window.end_ms);
    }

    match AlignablePair::new(&env_main, &env_secondary) {
        Ok(pair) => estimate_offset(&pair, alignment, &secondary.tempo),
        // Mismatched hops cannot happen with one shared AnalysisParams
        Err(_) => AlignmentResult::inconclusive(),
    }
}

fn to_response(result: AlignmentResult, tempo: TempoAdjustment) -> AlignResponse {
    AlignResponse {
        offset_ms: result.offset_ms,
        confidence: result.confidence,
        tempo_applied: tempo.applied,
        tempo_ratio: tempo.tempo_ratio,
    }
}

fn require_file(path: &str) -> ApiResult<()> {
    if !Path::new(path).is_file() {
        return Err(ApiError::NotFound(format!("File not found: {}", path)));
    }
    Ok(())
}
