//! Onset strength envelope extraction
//!
//! Reduces a PCM buffer to a low-rate envelope that emphasizes
//! transient energy: Hann-windowed STFT, log-compressed magnitudes,
//! half-wave-rectified spectral flux summed across bins. Sudden
//! increases in spectral energy (dialogue onsets, cuts, effects) score
//! high; decreases are suppressed. This is robust to the loudness and
//! EQ differences between two source masters, which is why raw-waveform
//! correlation is avoided.
//!
//! Pure function of the buffer: the same input always yields the same
//! envelope.

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::params::AnalysisParams;
use crate::pcm::PcmBuffer;

/// Onset strength envelope
///
/// `values[i]` is the transient-energy estimate for the window starting
/// at `i * hop_seconds`. Values are non-negative and peak-normalized to
/// 1.0 (an all-zero envelope stays all-zero).
///
/// Only fully filled analysis windows are framed, so the envelope runs
/// `(samples - fft_size) / hop + 1` frames, about `fft_size / hop`
/// frames short of `duration / hop_seconds` (a centered, padded STFT
/// would cover the tail). Both tracks in one comparison share the
/// framing, so the truncation cancels out of the offset estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    /// Per-frame onset strength, non-negative
    pub values: Vec<f32>,
    /// Time step between consecutive frames in seconds
    pub hop_seconds: f64,
}

impl OnsetEnvelope {
    /// Number of frames
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slice the envelope to a `[start_ms, end_ms)` time range, clamped
    /// to the envelope's extent
    pub fn slice_ms(&self, start_ms: f64, end_ms: f64) -> OnsetEnvelope {
        let per_frame = self.hop_seconds * 1000.0;
        let start = (start_ms.max(0.0) / per_frame).round() as usize;
        let end = (end_ms.max(0.0) / per_frame).round() as usize;
        let start = start.min(self.values.len());
        let end = end.clamp(start, self.values.len());
        OnsetEnvelope {
            values: self.values[start..end].to_vec(),
            hop_seconds: self.hop_seconds,
        }
    }
}

/// Extract the onset strength envelope of a buffer
pub fn onset_envelope(pcm: &PcmBuffer, params: &AnalysisParams) -> OnsetEnvelope {
    let hop_seconds = params.hop_seconds();
    let fft_size = params.fft_size;
    let hop = params.hop_size;

    if pcm.samples.len() < fft_size {
        return OnsetEnvelope {
            values: Vec::new(),
            hop_seconds,
        };
    }

    let num_frames = (pcm.samples.len() - fft_size) / hop + 1;
    let num_bins = fft_size / 2 + 1;

    let window = hann_window(fft_size);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
    let mut scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
    let mut frame_buf = vec![Complex::default(); fft_size];

    let mut prev_mags = vec![0.0f32; num_bins];
    let mut mags = vec![0.0f32; num_bins];
    let mut values = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        for (i, slot) in frame_buf.iter_mut().enumerate() {
            *slot = Complex::new(pcm.samples[start + i] * window[i], 0.0);
        }
        fft.process_with_scratch(&mut frame_buf, &mut scratch);

        // Log compression flattens absolute level differences between
        // masters so flux reflects relative energy change
        for (bin, mag) in mags.iter_mut().enumerate() {
            *mag = frame_buf[bin].norm().ln_1p();
        }

        // Half-wave-rectified flux: reward energy increases only
        let flux: f32 = mags
            .iter()
            .zip(prev_mags.iter())
            .map(|(&m, &p)| (m - p).max(0.0))
            .sum();

        // The first frame has no predecessor; flux against the zero
        // spectrum would just measure absolute energy
        values.push(if frame_idx == 0 { 0.0 } else { flux });

        std::mem::swap(&mut prev_mags, &mut mags);
    }

    // Peak-normalize so correlation sees shape, not scale
    let peak = values.iter().cloned().fold(0.0f32, f32::max);
    if peak > 0.0 {
        for v in &mut values {
            *v /= peak;
        }
    }

    OnsetEnvelope {
        values,
        hop_seconds,
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(rate: u32, seconds: f64, click_period_s: f64) -> PcmBuffer {
        let n = (rate as f64 * seconds) as usize;
        let period = (rate as f64 * click_period_s) as usize;
        let mut samples = vec![0.0f32; n];
        for (i, sample) in samples.iter_mut().enumerate() {
            // Short decaying burst at each click position
            let since_click = i % period;
            if since_click < 64 {
                *sample = 0.9 * (1.0 - since_click as f32 / 64.0);
            }
        }
        PcmBuffer {
            samples,
            sample_rate_hz: rate,
        }
    }

    #[test]
    fn test_envelope_is_deterministic() {
        let pcm = click_track(22_050, 3.0, 0.5);
        let params = AnalysisParams::default();

        let a = onset_envelope(&pcm, &params);
        let b = onset_envelope(&pcm, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_envelope_non_negative_and_normalized() {
        let pcm = click_track(22_050, 3.0, 0.5);
        let env = onset_envelope(&pcm, &AnalysisParams::default());

        assert!(!env.is_empty());
        assert!(env.values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        let peak = env.values.iter().cloned().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_silent_input_yields_zero_envelope() {
        let pcm = PcmBuffer {
            samples: vec![0.0; 22_050 * 2],
            sample_rate_hz: 22_050,
        };
        let env = onset_envelope(&pcm, &AnalysisParams::default());

        // Near-zero-variance envelope propagates; it is not an error
        assert!(!env.is_empty());
        assert!(env.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_clicks_produce_peaks_at_click_frames() {
        let params = AnalysisParams::default();
        let pcm = click_track(22_050, 4.0, 1.0);
        let env = onset_envelope(&pcm, &params);

        // Strongest frames should sit within one hop of a click position
        let frames_per_click = 1.0 / params.hop_seconds();
        for (i, &v) in env.values.iter().enumerate() {
            if v > 0.9 {
                let distance = (i as f64 % frames_per_click).min(
                    frames_per_click - (i as f64 % frames_per_click),
                );
                assert!(
                    distance <= 2.0,
                    "strong onset at frame {} is {} frames from a click",
                    i,
                    distance
                );
            }
        }
    }

    #[test]
    fn test_envelope_length_covers_full_windows() {
        let params = AnalysisParams::default();
        let pcm = click_track(22_050, 3.0, 0.5);
        let env = onset_envelope(&pcm, &params);

        let expected = (pcm.samples.len() - params.fft_size) / params.hop_size + 1;
        assert_eq!(env.len(), expected);

        // Shorter than duration / hop_seconds by at most one window's
        // worth of frames
        let nominal = (pcm.duration_seconds() / params.hop_seconds()).floor() as usize;
        assert!(env.len() <= nominal);
        assert!(nominal - env.len() <= params.fft_size / params.hop_size);
    }

    #[test]
    fn test_input_shorter_than_window_is_empty() {
        let pcm = PcmBuffer {
            samples: vec![0.5; 100],
            sample_rate_hz: 22_050,
        };
        let env = onset_envelope(&pcm, &AnalysisParams::default());
        assert!(env.is_empty());
    }

    #[test]
    fn test_slice_ms() {
        let env = OnsetEnvelope {
            values: (0..100).map(|i| i as f32 / 100.0).collect(),
            hop_seconds: 0.01,
        };

        let slice = env.slice_ms(100.0, 300.0);
        assert_eq!(slice.len(), 20);
        assert_eq!(slice.values[0], 0.1);
        assert_eq!(slice.hop_seconds, 0.01);

        let clamped = env.slice_ms(900.0, 5000.0);
        assert_eq!(clamped.len(), 10);
    }
}
