//! Service configuration
//!
//! Settings resolve in priority order:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file (`--config` / `DUBALIGN_CONFIG`)
//! 4. Compiled default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use dubalign_core::params::{
    AnalysisParams, DEFAULT_FFT_SIZE, DEFAULT_HOP_SIZE, DEFAULT_MAX_LAG_MS,
    DEFAULT_SAMPLE_RATE_HZ,
};

pub const DEFAULT_PORT: u16 = 8093;
pub const DEFAULT_ALIGNMENT_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_WAVEFORM_SAMPLES_PER_SECOND: f64 = 100.0;

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Directory for intermediate WAV / preview / frame artifacts
    pub temp_dir: PathBuf,
    /// Analysis parameters shared by every alignment in this process
    pub analysis: AnalysisParams,
    /// Default correlation search bound when a request omits one
    pub default_max_lag_ms: f64,
    /// Wall-clock budget for one alignment request
    pub alignment_timeout: Duration,
    /// Default waveform resolution when a request omits one
    pub waveform_samples_per_second: f64,
}

/// Optional overrides read from the TOML config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    port: Option<u16>,
    temp_dir: Option<PathBuf>,
    sample_rate_hz: Option<u32>,
    fft_size: Option<usize>,
    hop_size: Option<usize>,
    default_max_lag_ms: Option<f64>,
    alignment_timeout_seconds: Option<u64>,
    waveform_samples_per_second: Option<f64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            temp_dir: std::env::temp_dir().join("dubalign"),
            analysis: AnalysisParams::default(),
            default_max_lag_ms: DEFAULT_MAX_LAG_MS,
            alignment_timeout: Duration::from_secs(DEFAULT_ALIGNMENT_TIMEOUT_SECONDS),
            waveform_samples_per_second: DEFAULT_WAVEFORM_SAMPLES_PER_SECOND,
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from CLI arguments plus an optional TOML
    /// file
    ///
    /// CLI values (already env-resolved by clap) win over the file,
    /// which wins over the defaults.
    pub fn resolve(
        config_path: Option<&Path>,
        port: Option<u16>,
        temp_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let file = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("failed to read config file {}: {}", path.display(), e)
                })?;
                toml::from_str::<ConfigFile>(&raw).map_err(|e| {
                    anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e)
                })?
            }
            None => ConfigFile::default(),
        };

        let defaults = ServiceConfig::default();

        let analysis = AnalysisParams::new(
            file.sample_rate_hz.unwrap_or(DEFAULT_SAMPLE_RATE_HZ),
            file.fft_size.unwrap_or(DEFAULT_FFT_SIZE),
            file.hop_size.unwrap_or(DEFAULT_HOP_SIZE),
        )
        .map_err(|e| anyhow::anyhow!("invalid analysis parameters in config: {}", e))?;

        let default_max_lag_ms = file.default_max_lag_ms.unwrap_or(defaults.default_max_lag_ms);
        if !default_max_lag_ms.is_finite() || default_max_lag_ms <= 0.0 {
            anyhow::bail!("default_max_lag_ms must be positive, got {}", default_max_lag_ms);
        }

        let waveform_samples_per_second = file
            .waveform_samples_per_second
            .unwrap_or(defaults.waveform_samples_per_second);
        if !waveform_samples_per_second.is_finite() || waveform_samples_per_second <= 0.0 {
            anyhow::bail!(
                "waveform_samples_per_second must be positive, got {}",
                waveform_samples_per_second
            );
        }

        Ok(Self {
            port: port.or(file.port).unwrap_or(defaults.port),
            temp_dir: temp_dir.or(file.temp_dir).unwrap_or(defaults.temp_dir),
            analysis,
            default_max_lag_ms,
            alignment_timeout: Duration::from_secs(
                file.alignment_timeout_seconds
                    .unwrap_or(DEFAULT_ALIGNMENT_TIMEOUT_SECONDS),
            ),
            waveform_samples_per_second,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::resolve(None, None, None).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.analysis.sample_rate_hz, 22_050);
        assert_eq!(config.default_max_lag_ms, 60_000.0);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = 9000\ndefault_max_lag_ms = 5000.0\n").unwrap();

        let config = ServiceConfig::resolve(Some(&path), Some(9100), None).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.default_max_lag_ms, 5000.0);
    }

    #[test]
    fn test_rejects_bad_analysis_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        // fft_size must be a power of two
        std::fs::write(&path, "fft_size = 1000\n").unwrap();

        assert!(ServiceConfig::resolve(Some(&path), None, None).is_err());
    }

    #[test]
    fn test_rejects_nonpositive_lag_bound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_max_lag_ms = -1.0\n").unwrap();

        assert!(ServiceConfig::resolve(Some(&path), None, None).is_err());
    }
}
