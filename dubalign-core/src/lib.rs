//! dubalign-core - Audio Synchronization Engine
//!
//! Computes the time offset that best aligns two independently captured
//! recordings of the same event (e.g. a film's original audio and a
//! foreign-language dub), together with a confidence score.
//!
//! The engine is a stateless library of pure, CPU-bound functions:
//! - [`normalizer`]: decode a track to a mono, fixed-rate [`PcmBuffer`],
//!   optionally time-scaled to compensate for a frame-rate mismatch
//! - [`onset`]: reduce a buffer to a low-rate onset strength envelope
//! - [`align`]: cross-correlate two envelopes and estimate the offset
//! - [`waveform`]: summarize a buffer into display peaks
//!
//! Container probing, muxing and preview encoding are collaborator
//! concerns and live in dubalign-server.

pub mod align;
pub mod error;
pub mod normalizer;
pub mod onset;
pub mod params;
pub mod pcm;
pub mod waveform;

pub use crate::align::{AlignablePair, AlignmentResult};
pub use crate::error::{EngineError, Result};
pub use crate::normalizer::NormalizedTrack;
pub use crate::onset::OnsetEnvelope;
pub use crate::params::{AlignmentParams, AnalysisParams};
pub use crate::pcm::{PcmBuffer, TempoAdjustment};
pub use crate::waveform::WaveformPeaks;
