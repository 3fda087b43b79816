//! Waveform peak summarization for interactive display
//!
//! Downsamples a PCM buffer into fixed-rate amplitude peaks: max
//! absolute sample per non-overlapping bucket, normalized against the
//! buffer's own peak so the rendered waveform spans the same vertical
//! range regardless of input loudness. Purely presentational and
//! independent of the alignment pipeline.

use serde::{Deserialize, Serialize};

use crate::pcm::PcmBuffer;

/// Downsampled amplitude peaks for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformPeaks {
    /// Per-bucket peak amplitude in [0, 1]
    pub peaks: Vec<f32>,
    /// Number of peak buckets per second of audio
    pub samples_per_second: f64,
    /// Source buffer duration in seconds
    pub duration_seconds: f64,
}

/// Summarize a buffer into display peaks
///
/// An empty buffer or a non-positive resolution produces an empty peak
/// sequence; there are no other failure modes.
pub fn waveform_peaks(pcm: &PcmBuffer, samples_per_second: f64) -> WaveformPeaks {
    let duration_seconds = pcm.duration_seconds();

    let total_buckets = (duration_seconds * samples_per_second) as usize;
    if total_buckets == 0 || pcm.samples.is_empty() || samples_per_second <= 0.0 {
        return WaveformPeaks {
            peaks: Vec::new(),
            samples_per_second,
            duration_seconds,
        };
    }

    let samples_per_bucket = (pcm.samples.len() / total_buckets).max(1);
    let mut peaks: Vec<f32> = pcm
        .samples
        .chunks(samples_per_bucket)
        .take(total_buckets)
        .map(|bucket| bucket.iter().fold(0.0f32, |acc, &s| acc.max(s.abs())))
        .collect();

    let max_peak = peaks.iter().cloned().fold(0.0f32, f32::max);
    if max_peak > 0.0 {
        for p in &mut peaks {
            *p /= max_peak;
        }
    }

    WaveformPeaks {
        peaks,
        samples_per_second,
        duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_in_unit_range_and_expected_length() {
        let rate = 22_050u32;
        let samples: Vec<f32> = (0..rate * 3)
            .map(|i| 0.3 * (i as f32 * 0.01).sin())
            .collect();
        let pcm = PcmBuffer {
            samples,
            sample_rate_hz: rate,
        };

        let peaks = waveform_peaks(&pcm, 100.0);

        // 3 seconds at 100 peaks/s, within rounding
        assert!((peaks.peaks.len() as i64 - 300).abs() <= 1);
        assert!(peaks.peaks.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!((peaks.duration_seconds - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_self_normalized_to_full_scale() {
        // Quiet input still spans the full vertical range
        let pcm = PcmBuffer {
            samples: (0..22_050).map(|i| 0.05 * (i as f32 * 0.02).sin()).collect(),
            sample_rate_hz: 22_050,
        };

        let peaks = waveform_peaks(&pcm, 50.0);
        let max = peaks.peaks.iter().cloned().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input_produces_empty_peaks() {
        let pcm = PcmBuffer {
            samples: Vec::new(),
            sample_rate_hz: 22_050,
        };
        let peaks = waveform_peaks(&pcm, 100.0);
        assert!(peaks.peaks.is_empty());
        assert_eq!(peaks.duration_seconds, 0.0);
    }

    #[test]
    fn test_silent_input_stays_zero() {
        let pcm = PcmBuffer {
            samples: vec![0.0; 22_050],
            sample_rate_hz: 22_050,
        };
        let peaks = waveform_peaks(&pcm, 100.0);
        assert!(!peaks.peaks.is_empty());
        assert!(peaks.peaks.iter().all(|&p| p == 0.0));
    }
}
