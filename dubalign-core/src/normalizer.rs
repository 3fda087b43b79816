//! Sample normalization: decode to mono, fixed-rate, tempo-corrected PCM
//!
//! Uses symphonia for format-agnostic decoding (the intermediate WAV
//! artifacts produced by the media toolkit, but also MP3/FLAC/AAC when a
//! caller points the engine at a bare audio file) and rubato sinc
//! resampling for rate conversion and tempo scaling.
//!
//! Both tracks compared in one alignment call must be normalized with
//! the same [`AnalysisParams`]; onset framing is meaningless otherwise.

use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::params::AnalysisParams;
use crate::pcm::{PcmBuffer, TempoAdjustment};

/// A normalized track: the analysis buffer plus the tempo record that
/// downstream offset reporting must compensate for
#[derive(Debug, Clone)]
pub struct NormalizedTrack {
    pub pcm: PcmBuffer,
    pub tempo: TempoAdjustment,
}

/// Decode a source track into a mono [`PcmBuffer`] at the analysis
/// sample rate, applying the tempo adjustment before feature extraction
///
/// Decode failures (missing file, no audio track, corrupt stream,
/// zero-length or non-finite output) surface as
/// [`EngineError::Decode`] and are non-retryable.
pub fn normalize_file(
    path: &Path,
    params: &AnalysisParams,
    tempo: TempoAdjustment,
) -> Result<NormalizedTrack> {
    let (samples, native_rate) = decode_to_mono(path)?;

    if samples.is_empty() {
        return Err(EngineError::Decode(format!(
            "decoded zero samples from {}",
            path.display()
        )));
    }

    let mut samples = if native_rate != params.sample_rate_hz {
        debug!(
            path = %path.display(),
            from = native_rate,
            to = params.sample_rate_hz,
            "Resampling to analysis rate"
        );
        resample(&samples, params.sample_rate_hz as f64 / native_rate as f64)?
    } else {
        samples
    };

    if tempo.applied {
        debug!(
            path = %path.display(),
            tempo_ratio = tempo.tempo_ratio,
            "Applying tempo adjustment"
        );
        samples = resample(&samples, tempo.tempo_ratio)?;
    }

    // The extraction stages assume finite samples in [-1, 1]; catch
    // decoder misbehavior here rather than letting NaN propagate into
    // the correlation surface.
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(EngineError::Decode(format!(
            "non-finite samples decoded from {}",
            path.display()
        )));
    }
    for sample in &mut samples {
        *sample = sample.clamp(-1.0, 1.0);
    }

    Ok(NormalizedTrack {
        pcm: PcmBuffer {
            samples,
            sample_rate_hz: params.sample_rate_hz,
        },
        tempo,
    })
}

/// Time-scale a buffer by `tempo_ratio`, keeping the sample-rate label
///
/// A ratio of 0.96 shortens the buffer to 96% of its duration. Exposed
/// separately so the offset-compensation round trip is testable without
/// file fixtures.
pub fn apply_tempo(pcm: &PcmBuffer, tempo_ratio: f64) -> Result<PcmBuffer> {
    if !tempo_ratio.is_finite() || tempo_ratio <= 0.0 {
        return Err(EngineError::InvalidParameters(format!(
            "tempo ratio must be positive, got {}",
            tempo_ratio
        )));
    }
    Ok(PcmBuffer {
        samples: resample(&pcm.samples, tempo_ratio)?,
        sample_rate_hz: pcm.sample_rate_hz,
    })
}

/// Decode an audio file to mono f32 samples at its native rate
fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path).map_err(|e| {
        EngineError::Decode(format!("failed to open {}: {}", path.display(), e))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| {
            EngineError::Decode(format!("failed to probe {}: {}", path.display(), e))
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| {
            EngineError::Decode(format!("no audio track in {}", path.display()))
        })?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
        EngineError::Decode(format!("unknown sample rate in {}", path.display()))
    })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| {
            EngineError::Decode(format!(
                "no decoder for {}: {}",
                path.display(),
                e
            ))
        })?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(EngineError::Decode(format!(
                    "error reading packet from {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(|e| {
            EngineError::Decode(format!(
                "failed to decode packet in {}: {}",
                path.display(),
                e
            ))
        })?;

        mix_to_mono(&decoded, &mut samples);
    }

    debug!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        "Decoded audio"
    );

    Ok((samples, sample_rate))
}

/// Append a decoded packet to `out`, averaging channels to mono
fn mix_to_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    fn mix<S: Sample>(buf: &symphonia::core::audio::AudioBuffer<S>, out: &mut Vec<f32>)
    where
        f32: FromSample<S>,
    {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();
        out.reserve(frames);
        for frame in 0..frames {
            let mut sum = 0.0f32;
            for ch in 0..channels {
                sum += f32::from_sample(buf.chan(ch)[frame]);
            }
            out.push(sum / channels as f32);
        }
    }

    match decoded {
        AudioBufferRef::U8(buf) => mix(buf, out),
        AudioBufferRef::U16(buf) => mix(buf, out),
        AudioBufferRef::U24(buf) => mix(buf, out),
        AudioBufferRef::U32(buf) => mix(buf, out),
        AudioBufferRef::S8(buf) => mix(buf, out),
        AudioBufferRef::S16(buf) => mix(buf, out),
        AudioBufferRef::S24(buf) => mix(buf, out),
        AudioBufferRef::S32(buf) => mix(buf, out),
        AudioBufferRef::F32(buf) => mix(buf, out),
        AudioBufferRef::F64(buf) => mix(buf, out),
    }
}

/// Resample a mono buffer by `ratio` (output length ≈ input length × ratio)
/// using sinc interpolation
fn resample(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if (ratio - 1.0).abs() < 1e-12 {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Single-pass processing: chunk size equals the input length
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1).map_err(|e| {
            EngineError::Decode(format!("failed to create resampler: {}", e))
        })?;

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| EngineError::Decode(format!("resampling failed: {}", e)))?;

    Ok(output.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(rate: u32, seconds: f64, freq: f32) -> Vec<f32> {
        let n = (rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.8)
            .collect()
    }

    fn write_wav(path: &Path, samples: &[f32], rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_normalize_missing_file() {
        let result = normalize_file(
            Path::new("/nonexistent/audio.wav"),
            &AnalysisParams::default(),
            TempoAdjustment::none(),
        );
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }

    #[test]
    fn test_normalize_wav_to_analysis_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(44_100, 2.0, 440.0), 44_100);

        let params = AnalysisParams::default();
        let track = normalize_file(&path, &params, TempoAdjustment::none()).unwrap();

        assert_eq!(track.pcm.sample_rate_hz, 22_050);
        assert!(!track.tempo.applied);
        // 2 seconds at 22.05 kHz, within 1% for resampler rounding
        let expected = 2.0 * 22_050.0;
        assert!((track.pcm.samples.len() as f64 - expected).abs() < expected * 0.01);
        assert!(track.pcm.samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn test_normalize_applies_tempo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(22_050, 2.0, 440.0), 22_050);

        let params = AnalysisParams::default();
        let tempo = TempoAdjustment {
            applied: true,
            tempo_ratio: 0.96,
        };
        let track = normalize_file(&path, &params, tempo).unwrap();

        // Duration scaled by the tempo ratio
        let expected = 2.0 * 0.96 * 22_050.0;
        assert!((track.pcm.samples.len() as f64 - expected).abs() < expected * 0.01);
        assert_eq!(track.tempo, tempo);
    }

    #[test]
    fn test_apply_tempo_scales_duration() {
        let pcm = PcmBuffer {
            samples: sine(22_050, 1.0, 220.0),
            sample_rate_hz: 22_050,
        };

        let stretched = apply_tempo(&pcm, 1.5).unwrap();
        let expected = pcm.samples.len() as f64 * 1.5;
        assert!((stretched.samples.len() as f64 - expected).abs() < expected * 0.01);
        assert_eq!(stretched.sample_rate_hz, 22_050);
    }

    #[test]
    fn test_apply_tempo_rejects_bad_ratio() {
        let pcm = PcmBuffer {
            samples: vec![0.0; 100],
            sample_rate_hz: 22_050,
        };
        assert!(apply_tempo(&pcm, 0.0).is_err());
        assert!(apply_tempo(&pcm, -1.0).is_err());
    }
}
