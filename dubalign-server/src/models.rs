//! Wire schemas for API requests and responses

use serde::{Deserialize, Serialize};

/// Audio track metadata, as probed from a container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub index: usize,
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub channels: u32,
    pub sample_rate: u32,
    pub duration_seconds: f64,
}

/// Response containing the audio tracks of a media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracksResponse {
    pub file_path: String,
    pub duration_seconds: f64,
    pub tracks: Vec<AudioTrack>,
}

/// Request to extract an audio track to an analysis WAV
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub file_path: String,
    pub track_index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub wav_path: String,
    pub duration_seconds: f64,
}

/// Request to summarize a WAV into display peaks
#[derive(Debug, Deserialize)]
pub struct WaveformRequest {
    pub wav_path: String,
    /// Peak buckets per second; the configured default applies if omitted
    pub samples_per_second: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaveformResponse {
    pub peaks: Vec<f32>,
    pub duration_seconds: f64,
    pub samples_per_second: f64,
}

/// Request to detect the offset between two audio files
#[derive(Debug, Deserialize)]
pub struct AlignRequest {
    pub main_wav_path: String,
    pub secondary_wav_path: String,
    /// Correlation search bound; the configured default applies if omitted
    pub max_lag_ms: Option<f64>,
    /// Frame rate of the main source, for tempo compensation
    pub main_framerate: Option<f64>,
    /// Frame rate of the secondary source, for tempo compensation
    pub secondary_framerate: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlignResponse {
    pub offset_ms: f64,
    pub confidence: f32,
    /// True when a frame-rate mismatch caused the secondary track to be
    /// time-scaled before correlation
    pub tempo_applied: bool,
    pub tempo_ratio: f64,
}

/// Request to detect the offset within one time window of both tracks
#[derive(Debug, Deserialize)]
pub struct SegmentAlignRequest {
    pub main_wav_path: String,
    pub secondary_wav_path: String,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub max_lag_ms: Option<f64>,
}

/// Request to merge an aligned audio track into a video container
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub video_path: String,
    pub audio_path: String,
    pub offset_ms: f64,
    pub output_path: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub title: Option<String>,
    #[serde(default)]
    pub modify_original: bool,
}

fn default_language() -> String {
    "und".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResponse {
    pub output_path: String,
    pub success: bool,
}

/// Request to render a short preview clip with the candidate offset
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub video_path: String,
    pub audio_path: String,
    pub start_time_seconds: f64,
    #[serde(default = "default_preview_duration")]
    pub duration_seconds: f64,
    pub offset_ms: f64,
    #[serde(default = "default_true")]
    pub mute_main_audio: bool,
    #[serde(default)]
    pub mute_secondary_audio: bool,
}

fn default_preview_duration() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub preview_path: String,
    pub duration_seconds: f64,
}

/// Request to extract a single video frame for the scrub UI
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub video_path: String,
    pub time_seconds: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FrameResponse {
    pub frame_path: String,
    pub time_seconds: f64,
}

/// Response after clearing the artifact cache
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub cleared: bool,
}
