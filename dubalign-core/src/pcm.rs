//! PCM buffer and tempo adjustment value types

use serde::{Deserialize, Serialize};

/// Frame-rate differences below this ratio are treated as identical
/// (0.1%, well under the 24 vs 25 fps and 23.976 vs 24 fps cases that
/// matter for dub alignment)
pub const FRAMERATE_EPSILON: f64 = 0.001;

/// Mono PCM buffer at a fixed analysis sample rate
///
/// Produced by the normalizer, consumed by the onset extractor and the
/// waveform summarizer. Samples are f32 in [-1.0, 1.0], always single
/// channel, immutable once produced.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Mono samples, amplitude normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
}

impl PcmBuffer {
    /// Duration of the buffer in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate_hz as f64
    }

    /// Slice the buffer to a `[start_ms, end_ms)` time range, clamped to
    /// the buffer's extent
    pub fn slice_ms(&self, start_ms: f64, end_ms: f64) -> PcmBuffer {
        let rate = self.sample_rate_hz as f64;
        let start = ((start_ms.max(0.0) / 1000.0) * rate).round() as usize;
        let end = ((end_ms.max(0.0) / 1000.0) * rate).round() as usize;
        let start = start.min(self.samples.len());
        let end = end.clamp(start, self.samples.len());
        PcmBuffer {
            samples: self.samples[start..end].to_vec(),
            sample_rate_hz: self.sample_rate_hz,
        }
    }
}

/// Time-scaling applied to a buffer to compensate for a differing
/// source frame rate
///
/// A dub authored against a 25 fps master runs 25/24 faster when played
/// against a 24 fps original; onset timing is frame-rate-sensitive, so
/// the buffer is stretched before feature extraction. The record must be
/// retained downstream: an offset measured on the adjusted track has to
/// be mapped back to the original file's timeline before muxing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoAdjustment {
    /// Whether any time-scaling was applied
    pub applied: bool,
    /// `target_framerate / source_framerate`; 1.0 when not applied
    pub tempo_ratio: f64,
}

impl TempoAdjustment {
    /// No adjustment
    pub fn none() -> Self {
        Self {
            applied: false,
            tempo_ratio: 1.0,
        }
    }

    /// Derive an adjustment from a source/target frame-rate pair
    ///
    /// Returns `none()` when either rate is missing or the difference is
    /// negligible.
    pub fn from_framerates(source_fps: Option<f64>, target_fps: Option<f64>) -> Self {
        match (source_fps, target_fps) {
            (Some(source), Some(target))
                if source > 0.0 && target > 0.0 =>
            {
                let ratio = target / source;
                if (ratio - 1.0).abs() > FRAMERATE_EPSILON {
                    Self {
                        applied: true,
                        tempo_ratio: ratio,
                    }
                } else {
                    Self::none()
                }
            }
            _ => Self::none(),
        }
    }
}
