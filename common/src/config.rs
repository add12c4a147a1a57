use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const MAX_THROTTLE_INTERVAL_MS: u64 = 60_000;
pub const MAX_RESCAN_WINDOW_MS: u64 = 3_600_000;
/// Slowest accepted replay rate: one frame every 1000 s.
pub const MIN_REPLAY_FPS: f64 = 0.001;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pacing and deduplication settings for the live-frame pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScannerConfig {
    /// Minimum spacing between two decode submissions.
    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,
    /// Minimum time before the same payload is reported again.
    #[serde(default = "default_rescan_window_ms")]
    pub rescan_window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecoderConfig {
    /// Centred fraction of each frame dimension handed to the recognizer.
    #[serde(default = "default_scan_area_fraction")]
    pub scan_area_fraction: f64,
    /// Retry with a 90° rotated view when the upright one yields nothing.
    #[serde(default = "default_try_rotated")]
    pub try_rotated: bool,
    /// Let the engine spend more time per view, including its own rotations
    /// when the luminance source supports them.
    #[serde(default = "default_try_harder")]
    pub try_harder: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_replay_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default)]
    pub repeat: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: default_throttle_interval_ms(),
            rescan_window_ms: default_rescan_window_ms(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scan_area_fraction: default_scan_area_fraction(),
            try_rotated: default_try_rotated(),
            try_harder: default_try_harder(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            dir: default_replay_dir(),
            fps: default_fps(),
            repeat: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scanner.validate()?;
        self.decoder.validate()?;
        self.replay.validate()
    }
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.throttle_interval_ms == 0 || self.throttle_interval_ms > MAX_THROTTLE_INTERVAL_MS {
            return Err(ConfigError::invalid(
                "scanner.throttle_interval_ms",
                self.throttle_interval_ms,
                "must be between 1 and 60000 ms",
            ));
        }
        if self.rescan_window_ms > MAX_RESCAN_WINDOW_MS {
            return Err(ConfigError::invalid(
                "scanner.rescan_window_ms",
                self.rescan_window_ms,
                "must not exceed 3600000 ms",
            ));
        }
        Ok(())
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn rescan_window(&self) -> Duration {
        Duration::from_millis(self.rescan_window_ms)
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // NaN fails both comparisons, so test for the accepted range.
        let fraction = self.scan_area_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "decoder.scan_area_fraction",
                fraction,
                "must be in (0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() || self.fps < MIN_REPLAY_FPS {
            return Err(ConfigError::invalid(
                "replay.fps",
                self.fps,
                "must be a finite number of at least 0.001",
            ));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value {value} for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

fn default_throttle_interval_ms() -> u64 {
    300
}
fn default_rescan_window_ms() -> u64 {
    5000
}
fn default_scan_area_fraction() -> f64 {
    0.7
}
fn default_try_rotated() -> bool {
    true
}
fn default_try_harder() -> bool {
    true
}
fn default_replay_dir() -> PathBuf {
    PathBuf::from("frames")
}
fn default_fps() -> f64 {
    10.0
}
fn default_log_level() -> String {
    "info".into()
}
