//! Container probing and muxing via the ffmpeg/ffprobe binaries
//!
//! The engine itself never touches video containers; everything that
//! needs a demuxer or muxer shells out to ffmpeg, the same way the
//! surrounding tooling invokes it. Extracted WAVs and scrub frames are
//! cached through [`ArtifactCache`] so the UI can hammer these
//! endpoints while scrubbing.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::models::{
    AudioTrack, ExtractResponse, FrameResponse, MergeResponse, PreviewResponse, TracksResponse,
};
use crate::services::artifact_cache::ArtifactCache;

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{0}")]
    InvalidTrack(String),

    #[error("{tool} failed: {stderr}")]
    CommandFailed { tool: String, stderr: String },

    #[error("unparseable probe output: {0}")]
    UnparseableOutput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, ToolkitError>;

/// ffprobe `-print_format json` output, reduced to the fields we read
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    // ffprobe emits numeric fields as strings
    sample_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    language: Option<String>,
    title: Option<String>,
}

/// Wrapper around the ffmpeg/ffprobe binaries plus the artifact cache
#[derive(Debug, Clone)]
pub struct MediaToolkit {
    cache: ArtifactCache,
}

impl MediaToolkit {
    pub fn new(cache: ArtifactCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// List the audio tracks of a media file
    pub async fn audio_tracks(&self, file_path: &str) -> Result<TracksResponse> {
        let probe = self.probe(file_path).await?;
        let duration_seconds = parse_seconds(probe.format.duration.as_deref());

        let tracks = probe
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some("audio"))
            .enumerate()
            .map(|(index, stream)| AudioTrack {
                index,
                codec: stream
                    .codec_name
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                language: stream.tags.language.clone(),
                title: stream.tags.title.clone(),
                channels: stream.channels.unwrap_or(2),
                sample_rate: stream
                    .sample_rate
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(44_100),
                duration_seconds: stream
                    .duration
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(duration_seconds),
            })
            .collect();

        Ok(TracksResponse {
            file_path: file_path.to_string(),
            duration_seconds,
            tracks,
        })
    }

    /// Frame rate of the first video stream, if the file has one
    pub async fn video_framerate(&self, file_path: &str) -> Result<Option<f64>> {
        let probe = self.probe(file_path).await?;
        Ok(probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| s.avg_frame_rate.as_deref())
            .and_then(parse_frame_rate))
    }

    /// Extract one audio track to a mono analysis WAV at `sample_rate_hz`
    ///
    /// The output is cache-keyed on the source path, track index, and
    /// rate; a prior extraction is reused as-is.
    pub async fn extract_audio(
        &self,
        file_path: &str,
        track_index: usize,
        sample_rate_hz: u32,
    ) -> Result<ExtractResponse> {
        let tracks = self.audio_tracks(file_path).await?;
        if track_index >= tracks.tracks.len() {
            return Err(ToolkitError::InvalidTrack(format!(
                "invalid track index {}; file has {} audio tracks",
                track_index,
                tracks.tracks.len()
            )));
        }

        let rate = sample_rate_hz.to_string();
        let output_path = self.cache.keyed_path(
            "extract",
            &[file_path, &track_index.to_string(), &rate],
            "wav",
        );

        if !output_path.exists() {
            let args = [
                "-y",
                "-i",
                file_path,
                "-map",
                &format!("0:a:{}", track_index),
                "-acodec",
                "pcm_s16le",
                "-ar",
                &rate,
                "-ac",
                "1",
            ];
            run_tool("ffmpeg", &args, &output_path).await?;
            info!(
                source = file_path,
                track = track_index,
                output = %output_path.display(),
                "Extracted analysis WAV"
            );
        } else {
            debug!(output = %output_path.display(), "Reusing cached extraction");
        }

        let probe = self.probe(&output_path.to_string_lossy()).await?;
        Ok(ExtractResponse {
            wav_path: output_path.to_string_lossy().into_owned(),
            duration_seconds: parse_seconds(probe.format.duration.as_deref()),
        })
    }

    /// Merge an audio file into a video container as a new track,
    /// delayed by `offset_ms`
    ///
    /// With `modify_original`, the merge lands in a scratch file that
    /// replaces the source only after ffmpeg succeeds.
    #[allow(clippy::too_many_arguments)]
    pub async fn merge_audio(
        &self,
        video_path: &str,
        audio_path: &str,
        offset_ms: f64,
        output_path: &str,
        language: &str,
        title: Option<&str>,
        modify_original: bool,
    ) -> Result<MergeResponse> {
        require_file(video_path)?;
        require_file(audio_path)?;

        let offset_seconds = offset_ms / 1000.0;
        let new_track_index = self.audio_tracks(video_path).await?.tracks.len();

        let suffix = Path::new(video_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mkv");
        let actual_output = if modify_original {
            self.cache
                .keyed_path("merge", &[video_path, audio_path, &offset_ms.to_string()], suffix)
        } else {
            PathBuf::from(output_path)
        };

        let offset_arg = offset_seconds.to_string();
        let codec_arg = format!("-c:a:{}", new_track_index);
        let meta_selector = format!("-metadata:s:a:{}", new_track_index);
        let language_arg = format!("language={}", language);

        let mut args: Vec<&str> = vec![
            "-y",
            "-i",
            video_path,
            "-itsoffset",
            &offset_arg,
            "-i",
            audio_path,
            "-map",
            "0",
            "-map",
            "1:a",
            "-c",
            "copy",
            &codec_arg,
            "aac",
            &meta_selector,
            &language_arg,
        ];
        let title_arg = title.map(|t| format!("title={}", t));
        if let Some(ref title_arg) = title_arg {
            args.push(&meta_selector);
            args.push(title_arg);
        }

        let result = run_tool("ffmpeg", &args, &actual_output).await;
        if result.is_err() && modify_original && actual_output.exists() {
            let _ = std::fs::remove_file(&actual_output);
        }
        result?;

        let final_output = if modify_original {
            move_file(&actual_output, Path::new(video_path))?;
            video_path.to_string()
        } else {
            output_path.to_string()
        };

        info!(
            video = video_path,
            audio = audio_path,
            offset_ms,
            output = final_output,
            "Merged audio track"
        );

        Ok(MergeResponse {
            output_path: final_output,
            success: true,
        })
    }

    /// Render a short preview clip at the candidate offset
    ///
    /// The audio seek position compensates for the offset: a positive
    /// offset means the secondary track plays later, so the same video
    /// position needs audio from an earlier point.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_preview(
        &self,
        video_path: &str,
        audio_path: &str,
        start_time_seconds: f64,
        duration_seconds: f64,
        offset_ms: f64,
        mute_main_audio: bool,
        mute_secondary_audio: bool,
    ) -> Result<PreviewResponse> {
        require_file(video_path)?;
        require_file(audio_path)?;

        let output_path = self.cache.keyed_path(
            "preview",
            &[
                video_path,
                audio_path,
                &start_time_seconds.to_string(),
                &duration_seconds.to_string(),
                &offset_ms.to_string(),
                &mute_main_audio.to_string(),
                &mute_secondary_audio.to_string(),
            ],
            "mp4",
        );

        let audio_start = (start_time_seconds - offset_ms / 1000.0).max(0.0);
        let video_start = start_time_seconds.max(0.0).to_string();
        let audio_start = audio_start.to_string();
        let duration = duration_seconds.to_string();

        let mut args: Vec<&str> = vec![
            "-y",
            "-ss",
            &video_start,
            "-i",
            video_path,
            "-ss",
            &audio_start,
            "-i",
            audio_path,
            "-t",
            &duration,
            "-map",
            "0:v:0",
        ];

        match (mute_main_audio, mute_secondary_audio) {
            (true, true) => args.push("-an"),
            (true, false) => args.extend(["-map", "1:a:0"]),
            (false, true) => args.extend(["-map", "0:a:0"]),
            (false, false) => args.extend([
                "-filter_complex",
                "[0:a:0][1:a:0]amix=inputs=2:duration=first[aout]",
                "-map",
                "[aout]",
            ]),
        }

        // Re-encode video for frame-accurate seeking; fast and small,
        // this clip exists only to audition the offset
        args.extend(["-c:v", "libx264", "-preset", "ultrafast", "-crf", "28"]);
        if !(mute_main_audio && mute_secondary_audio) {
            args.extend(["-c:a", "aac", "-b:a", "128k"]);
        }
        args.extend(["-movflags", "+faststart"]);

        run_tool("ffmpeg", &args, &output_path).await?;

        Ok(PreviewResponse {
            preview_path: output_path.to_string_lossy().into_owned(),
            duration_seconds,
        })
    }

    /// Extract a single frame as JPEG, cache-keyed on path and time
    pub async fn extract_frame(
        &self,
        video_path: &str,
        time_seconds: f64,
    ) -> Result<FrameResponse> {
        require_file(video_path)?;

        let output_path = self.cache.keyed_path(
            "frame",
            &[video_path, &time_seconds.to_string()],
            "jpg",
        );

        if !output_path.exists() {
            let seek = time_seconds.max(0.0).to_string();
            // -ss before -i for fast keyframe seeking
            let args = [
                "-y", "-ss", &seek, "-i", video_path, "-vframes", "1", "-q:v", "2",
            ];
            run_tool("ffmpeg", &args, &output_path).await?;
        }

        Ok(FrameResponse {
            frame_path: output_path.to_string_lossy().into_owned(),
            time_seconds,
        })
    }

    async fn probe(&self, file_path: &str) -> Result<ProbeOutput> {
        require_file(file_path)?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                file_path,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ToolkitError::CommandFailed {
                tool: "ffprobe".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ToolkitError::UnparseableOutput(e.to_string()))
    }
}

fn require_file(path: &str) -> Result<()> {
    let p = Path::new(path);
    if !p.is_file() {
        return Err(ToolkitError::FileNotFound(p.to_path_buf()));
    }
    Ok(())
}

/// Move a file, falling back to copy+remove when rename fails
///
/// The cache directory is usually on tmpfs while the source video is
/// not, so a plain rename across the device boundary returns EXDEV.
fn move_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_and_remove(src, dst)
}

fn copy_and_remove(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::copy(src, dst)?;
    std::fs::remove_file(src)
}

fn parse_seconds(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

/// Parse ffprobe's `avg_frame_rate` fraction ("24000/1001")
fn parse_frame_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

async fn run_tool(tool: &str, args: &[&str], output_path: &Path) -> Result<()> {
    debug!(tool, ?args, output = %output_path.display(), "Running external tool");

    let output = Command::new(tool)
        .args(args)
        .arg(output_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(ToolkitError::CommandFailed {
            tool: tool.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("24/1"), Some(24.0));
        let ntsc = parse_frame_rate("24000/1001").unwrap();
        assert!((ntsc - 23.976).abs() < 0.001);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("nonsense"), None);
    }

    #[test]
    fn test_probe_json_shape() {
        // The field subset we deserialize from ffprobe output
        let raw = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "avg_frame_rate": "25/1"},
                {"codec_type": "audio", "codec_name": "aac", "channels": 6,
                 "sample_rate": "48000", "duration": "5400.2",
                 "tags": {"language": "eng", "title": "Surround"}}
            ],
            "format": {"duration": "5400.5"}
        }"#;

        let probe: ProbeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(probe.streams.len(), 2);
        let audio = &probe.streams[1];
        assert_eq!(audio.codec_type.as_deref(), Some("audio"));
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.tags.language.as_deref(), Some("eng"));
        assert_eq!(parse_seconds(probe.format.duration.as_deref()), 5400.5);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(
            require_file("/nonexistent/movie.mkv"),
            Err(ToolkitError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_move_file_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.mkv");
        let dst = dir.path().join("original.mkv");
        std::fs::write(&src, b"merged content").unwrap();
        std::fs::write(&dst, b"original content").unwrap();

        move_file(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"merged content");
    }

    #[test]
    fn test_copy_and_remove_crosses_into_destination() {
        // The rename fallback path: copy the payload, then drop the
        // cache-side scratch file
        let scratch = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        let src = scratch.path().join("merged.mkv");
        let dst = library.path().join("film.mkv");
        std::fs::write(&src, b"merged content").unwrap();
        std::fs::write(&dst, b"original content").unwrap();

        copy_and_remove(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"merged content");
    }
}
