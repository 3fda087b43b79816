//! Cross-correlation offset estimation
//!
//! Correlates two onset envelopes over a bounded lag range, locates the
//! best lag with sub-frame parabolic interpolation, and derives a
//! confidence score from the normalized correlation peak.
//!
//! Never fails for well-formed envelopes: an inconclusive result is a
//! zero-confidence [`AlignmentResult`], and it is the caller's decision
//! whether to accept it, prompt the user, or fall back to manual
//! alignment.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::onset::OnsetEnvelope;
use crate::params::AlignmentParams;
use crate::pcm::TempoAdjustment;

/// Hop sizes within this relative tolerance are considered identical
const HOP_TOLERANCE: f64 = 1e-9;

/// Correlation denominators below this are treated as silence
const ENERGY_FLOOR: f32 = 1e-12;

/// Estimated offset between two tracks
///
/// `offset_ms` is the shift to apply to the secondary track so it lines
/// up with the main track: positive means the secondary track's content
/// occurs later. Expressed in the secondary track's original,
/// un-stretched timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Offset in milliseconds
    pub offset_ms: f64,
    /// Normalized correlation strength at the chosen lag, in [0, 1]
    pub confidence: f32,
}

impl AlignmentResult {
    /// The zero-confidence fallback for degenerate inputs and timeouts
    pub fn inconclusive() -> Self {
        Self {
            offset_ms: 0.0,
            confidence: 0.0,
        }
    }
}

/// Two envelopes proven to share the same framing
///
/// Correlating envelopes with different hop sizes is a contract error;
/// making the pairing a type rules it out at the estimator instead of a
/// runtime assertion buried inside the lag loop.
#[derive(Debug)]
pub struct AlignablePair<'a> {
    main: &'a OnsetEnvelope,
    secondary: &'a OnsetEnvelope,
    hop_seconds: f64,
}

impl<'a> AlignablePair<'a> {
    /// Pair two envelopes, rejecting mismatched hop sizes
    pub fn new(main: &'a OnsetEnvelope, secondary: &'a OnsetEnvelope) -> Result<Self> {
        let hop_a = main.hop_seconds;
        let hop_b = secondary.hop_seconds;
        if hop_a <= 0.0 || hop_b <= 0.0 {
            return Err(EngineError::InvalidParameters(format!(
                "hop size must be positive, got {} and {}",
                hop_a, hop_b
            )));
        }
        if (hop_a - hop_b).abs() > HOP_TOLERANCE * hop_a.max(hop_b) {
            return Err(EngineError::InvalidParameters(format!(
                "envelopes have mismatched hop sizes: {} vs {}",
                hop_a, hop_b
            )));
        }
        Ok(Self {
            main,
            secondary,
            hop_seconds: hop_a,
        })
    }

    pub fn hop_seconds(&self) -> f64 {
        self.hop_seconds
    }
}

/// Estimate the offset of the secondary track relative to the main track
///
/// Searches every integer lag in `[-max_lag, +max_lag]` frames with
/// per-lag normalization by the geometric mean of the overlapping
/// segments' energies, refines the winning lag to sub-frame precision,
/// and maps the result back to the secondary track's original timeline
/// when a tempo adjustment was applied to its buffer.
pub fn estimate_offset(
    pair: &AlignablePair,
    params: &AlignmentParams,
    secondary_tempo: &TempoAdjustment,
) -> AlignmentResult {
    let a = &pair.main.values;
    let b = &pair.secondary.values;
    let hop = pair.hop_seconds();

    if a.is_empty() || b.is_empty() {
        return AlignmentResult::inconclusive();
    }

    let max_lag = (params.max_lag_ms / 1000.0 / hop).round() as i64;
    let max_lag = max_lag.max(1);

    // Normalized correlation score per lag; NaN marks lags with no
    // usable overlap so parabolic refinement can skip them
    let num_lags = (2 * max_lag + 1) as usize;
    let mut scores = vec![f32::NAN; num_lags];

    let mut best_score = f32::NEG_INFINITY;
    let mut best_lag: Option<i64> = None;

    for (slot, lag) in (-max_lag..=max_lag).enumerate() {
        let score = match correlation_at(a, b, lag) {
            Some(score) => score,
            None => continue,
        };
        scores[slot] = score;

        // Tie-break toward the smaller absolute lag so a flat surface
        // (e.g. periodic content) prefers the null hypothesis
        let better = score > best_score + f32::EPSILON
            || (score >= best_score - f32::EPSILON
                && best_lag.map_or(true, |b| lag.abs() < b.abs()));
        if better {
            best_score = score;
            best_lag = Some(lag);
        }
    }

    let Some(best_lag) = best_lag else {
        // Flat/empty correlation surface: all-zero envelope or no
        // overlap anywhere in the search window
        return AlignmentResult::inconclusive();
    };

    let refined = refine_peak(&scores, best_lag, max_lag);

    let mut offset_ms = refined * hop * 1000.0;

    // Express the offset in the un-stretched timeline of the secondary
    // file so downstream muxing gets a time value valid against the
    // original track
    if secondary_tempo.applied {
        offset_ms /= secondary_tempo.tempo_ratio;
    }

    // Sub-frame refinement may nudge past the bound by half a frame
    offset_ms = offset_ms.clamp(-params.max_lag_ms, params.max_lag_ms);

    AlignmentResult {
        offset_ms,
        confidence: best_score.clamp(0.0, 1.0),
    }
}

/// Normalized cross-correlation at one lag
///
/// Positive lag means the secondary envelope is delayed relative to the
/// main one: `b[i + lag]` is compared against `a[i]`. Only the
/// overlapping region contributes, normalized by the geometric mean of
/// the two segments' energies so values are comparable across lags and
/// signal lengths.
fn correlation_at(a: &[f32], b: &[f32], lag: i64) -> Option<f32> {
    let start = (-lag).max(0) as usize;
    let end = (a.len() as i64).min(b.len() as i64 - lag).max(0) as usize;
    if end <= start {
        return None;
    }

    let mut dot = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for i in start..end {
        let x = a[i] as f64;
        let y = b[(i as i64 + lag) as usize] as f64;
        dot += x * y;
        energy_a += x * x;
        energy_b += y * y;
    }

    let denom = (energy_a * energy_b).sqrt();
    if denom <= ENERGY_FLOOR as f64 {
        return None;
    }

    Some((dot / denom) as f32)
}

/// Parabolic interpolation over the three scores around the peak
///
/// Standard peak-fitting: the vertex of the parabola through
/// `(lag-1, prev)`, `(lag, curr)`, `(lag+1, next)` avoids quantizing
/// the offset to the hop size. Falls back to the integer lag at the
/// search edges or on a degenerate fit.
fn refine_peak(scores: &[f32], best_lag: i64, max_lag: i64) -> f64 {
    if best_lag <= -max_lag || best_lag >= max_lag {
        return best_lag as f64;
    }

    let idx = (best_lag + max_lag) as usize;
    let prev = scores[idx - 1];
    let curr = scores[idx];
    let next = scores[idx + 1];
    if !prev.is_finite() || !next.is_finite() {
        return best_lag as f64;
    }

    let denom = (prev - 2.0 * curr + next) as f64;
    if denom.abs() < 1e-12 {
        return best_lag as f64;
    }

    let delta = (0.5 * (prev - next) as f64 / denom).clamp(-0.5, 0.5);
    best_lag as f64 + delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(values: Vec<f32>, hop_seconds: f64) -> OnsetEnvelope {
        OnsetEnvelope {
            values,
            hop_seconds,
        }
    }

    /// Sparse pulse train with a little shape around each pulse
    fn pulse_envelope(len: usize, period: usize, hop_seconds: f64) -> OnsetEnvelope {
        let mut values = vec![0.0f32; len];
        let mut i = period / 2;
        while i < len {
            values[i] = 1.0;
            if i + 1 < len {
                values[i + 1] = 0.4;
            }
            if i >= 1 {
                values[i - 1] = 0.2;
            }
            i += period;
        }
        envelope(values, hop_seconds)
    }

    fn shift_right(env: &OnsetEnvelope, frames: usize) -> OnsetEnvelope {
        let mut values = vec![0.0f32; frames];
        values.extend_from_slice(&env.values);
        values.truncate(env.values.len());
        envelope(values, env.hop_seconds)
    }

    #[test]
    fn test_pair_rejects_mismatched_hops() {
        let a = envelope(vec![1.0; 10], 0.01);
        let b = envelope(vec![1.0; 10], 0.02);
        assert!(matches!(
            AlignablePair::new(&a, &b),
            Err(EngineError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_self_alignment_identity() {
        let a = pulse_envelope(1000, 173, 0.01);
        let pair = AlignablePair::new(&a, &a).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(2000.0).unwrap(),
            &TempoAdjustment::none(),
        );

        assert!(result.offset_ms.abs() <= 10.0, "offset {}", result.offset_ms);
        assert!(result.confidence > 0.99, "confidence {}", result.confidence);
    }

    #[test]
    fn test_known_shift_recovery_positive() {
        let a = pulse_envelope(1000, 173, 0.01);
        let b = shift_right(&a, 50);
        let pair = AlignablePair::new(&a, &b).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(2000.0).unwrap(),
            &TempoAdjustment::none(),
        );

        // 50 frames at 10 ms = 500 ms, recovered within one hop
        assert!((result.offset_ms - 500.0).abs() <= 10.0, "offset {}", result.offset_ms);
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_known_shift_recovery_negative() {
        let b = pulse_envelope(1000, 173, 0.01);
        let a = shift_right(&b, 30);
        let pair = AlignablePair::new(&a, &b).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(2000.0).unwrap(),
            &TempoAdjustment::none(),
        );

        assert!((result.offset_ms + 300.0).abs() <= 10.0, "offset {}", result.offset_ms);
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_all_zero_envelope_is_inconclusive() {
        let a = pulse_envelope(500, 100, 0.01);
        let silent = envelope(vec![0.0; 500], 0.01);
        let pair = AlignablePair::new(&a, &silent).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(1000.0).unwrap(),
            &TempoAdjustment::none(),
        );

        assert_eq!(result.offset_ms, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.offset_ms.is_finite());
    }

    #[test]
    fn test_offset_never_exceeds_bound() {
        let a = pulse_envelope(1000, 173, 0.01);
        // True shift of 80 frames = 800 ms, but the bound is 300 ms
        let b = shift_right(&a, 80);
        let pair = AlignablePair::new(&a, &b).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(300.0).unwrap(),
            &TempoAdjustment::none(),
        );

        assert!(result.offset_ms.abs() <= 300.0);
    }

    #[test]
    fn test_tempo_compensation_divides_offset() {
        let a = pulse_envelope(1000, 173, 0.01);
        let b = shift_right(&a, 50);
        let pair = AlignablePair::new(&a, &b).unwrap();

        let tempo = TempoAdjustment {
            applied: true,
            tempo_ratio: 0.96,
        };
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(2000.0).unwrap(),
            &tempo,
        );

        // Measured 500 ms on the stretched timeline maps back to the
        // original file's timeline
        let expected = 500.0 / 0.96;
        assert!((result.offset_ms - expected).abs() <= 15.0, "offset {}", result.offset_ms);
    }

    #[test]
    fn test_empty_envelope_is_inconclusive() {
        let a = envelope(Vec::new(), 0.01);
        let b = envelope(vec![1.0; 100], 0.01);
        let pair = AlignablePair::new(&a, &b).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::default(),
            &TempoAdjustment::none(),
        );
        assert_eq!(result, AlignmentResult::inconclusive());
    }

    #[test]
    fn test_sub_frame_refinement_stays_within_half_hop() {
        let a = pulse_envelope(800, 97, 0.01);
        let b = shift_right(&a, 20);
        let pair = AlignablePair::new(&a, &b).unwrap();
        let result = estimate_offset(
            &pair,
            &AlignmentParams::new(1000.0).unwrap(),
            &TempoAdjustment::none(),
        );

        // The refined offset deviates from the integer-lag answer by at
        // most half a frame
        assert!((result.offset_ms - 200.0).abs() <= 5.0, "offset {}", result.offset_ms);
    }
}
