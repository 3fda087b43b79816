//! Validated analysis parameter records
//!
//! Both tracks compared in one alignment call must share one
//! [`AnalysisParams`] value; the sample rate and hop size determine the
//! framing of every envelope the estimator sees. Invalid combinations
//! are rejected at construction rather than deep inside the algorithms.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default analysis sample rate in Hz (balance of frequency resolution
/// vs. compute cost)
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 22_050;

/// Default STFT window length in samples
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Default hop between analysis frames in samples (~23.2 ms at 22.05 kHz)
pub const DEFAULT_HOP_SIZE: usize = 512;

/// Default maximum search bound in milliseconds
pub const DEFAULT_MAX_LAG_MS: f64 = 60_000.0;

/// Framing parameters for normalization and onset extraction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Analysis sample rate in Hz
    pub sample_rate_hz: u32,
    /// STFT window length in samples
    pub fft_size: usize,
    /// Hop between consecutive frames in samples
    pub hop_size: usize,
}

impl AnalysisParams {
    /// Create validated analysis parameters
    pub fn new(sample_rate_hz: u32, fft_size: usize, hop_size: usize) -> Result<Self> {
        if sample_rate_hz == 0 {
            return Err(EngineError::InvalidParameters(
                "sample rate must be positive".to_string(),
            ));
        }
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(EngineError::InvalidParameters(format!(
                "FFT size must be a positive power of two, got {}",
                fft_size
            )));
        }
        if hop_size == 0 || hop_size > fft_size {
            return Err(EngineError::InvalidParameters(format!(
                "hop size must be in 1..={}, got {}",
                fft_size, hop_size
            )));
        }
        Ok(Self {
            sample_rate_hz,
            fft_size,
            hop_size,
        })
    }

    /// Time step between consecutive envelope frames in seconds
    pub fn hop_seconds(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate_hz as f64
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            fft_size: DEFAULT_FFT_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
        }
    }
}

/// Search bound for the alignment estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// Maximum offset magnitude to search, in milliseconds
    pub max_lag_ms: f64,
}

impl AlignmentParams {
    /// Create validated alignment parameters
    pub fn new(max_lag_ms: f64) -> Result<Self> {
        if !max_lag_ms.is_finite() || max_lag_ms <= 0.0 {
            return Err(EngineError::InvalidParameters(format!(
                "search bound must be positive, got {}",
                max_lag_ms
            )));
        }
        Ok(Self { max_lag_ms })
    }
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            max_lag_ms: DEFAULT_MAX_LAG_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let params = AnalysisParams::default();
        assert_eq!(params.sample_rate_hz, 22_050);
        assert_eq!(params.hop_size, 512);
        // 512 / 22050 ≈ 23.2 ms
        assert!((params.hop_seconds() - 0.02322).abs() < 0.0001);
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert!(AnalysisParams::new(0, 2048, 512).is_err());
    }

    #[test]
    fn test_rejects_non_power_of_two_fft() {
        assert!(AnalysisParams::new(22_050, 1000, 512).is_err());
    }

    #[test]
    fn test_rejects_hop_larger_than_window() {
        assert!(AnalysisParams::new(22_050, 1024, 2048).is_err());
    }

    #[test]
    fn test_rejects_non_positive_search_bound() {
        assert!(AlignmentParams::new(0.0).is_err());
        assert!(AlignmentParams::new(-100.0).is_err());
        assert!(AlignmentParams::new(f64::NAN).is_err());
    }

    #[test]
    fn test_accepts_positive_search_bound() {
        let params = AlignmentParams::new(2000.0).unwrap();
        assert_eq!(params.max_lag_ms, 2000.0);
    }
}
