//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Lowest accepted JPEG quality
pub const MIN_JPEG_QUALITY: i64 = 1;
/// Highest accepted JPEG quality
pub const MAX_JPEG_QUALITY: i64 = 100;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Worker count below one
    InvalidJobs(i64),
    /// JPEG quality outside 1..=100
    InvalidQuality(i64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::InvalidJobs(n) => write!(f, "invalid job thread number [{}]", n),
            ConfigError::InvalidQuality(q) => write!(f, "invalid jpeg quality [{}]", q),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Batch-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Number of conversion workers (must be >= 1)
    #[serde(default = "default_jobs")]
    pub jobs: i64,
    /// Replace existing destination files instead of failing
    #[serde(default)]
    pub overwrite: bool,
    /// Draw a progress bar while converting
    #[serde(default = "default_progress")]
    pub progress: bool,
    /// Root directory destinations are remapped under (None = next to the source)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_jobs() -> i64 {
    1
}

fn default_progress() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            overwrite: false,
            progress: default_progress(),
            output_dir: None,
        }
    }
}

impl BatchConfig {
    /// Worker count, rejected if it is below one
    pub fn validated_jobs(&self) -> Result<u32, ConfigError> {
        if self.jobs < 1 {
            return Err(ConfigError::InvalidJobs(self.jobs));
        }
        u32::try_from(self.jobs).map_err(|_| ConfigError::InvalidJobs(self.jobs))
    }
}

/// JPEG encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JpegConfig {
    /// Encoder quality (1-100, default 90)
    #[serde(default = "default_jpeg_quality")]
    pub quality: i64,
}

fn default_jpeg_quality() -> i64 {
    90
}

impl Default for JpegConfig {
    fn default() -> Self {
        Self {
            quality: default_jpeg_quality(),
        }
    }
}

impl JpegConfig {
    /// Quality as the encoder expects it, rejected outside 1..=100
    pub fn validated_quality(&self) -> Result<u8, ConfigError> {
        validate_quality(self.quality)
    }
}

/// Check a JPEG quality value against the accepted range
pub fn validate_quality(quality: i64) -> Result<u8, ConfigError> {
    if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality) {
        return Err(ConfigError::InvalidQuality(quality));
    }
    u8::try_from(quality).map_err(|_| ConfigError::InvalidQuality(quality))
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub jpeg: JpegConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - KELP_JOBS -> batch.jobs
    /// - KELP_OVERWRITE -> batch.overwrite
    /// - KELP_PROGRESS -> batch.progress
    /// - KELP_OUTPUT_DIR -> batch.output_dir
    /// - KELP_JPEG_QUALITY -> jpeg.quality
    /// - KELP_LOG_LEVEL -> log.level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("KELP_JOBS") {
            if let Ok(jobs) = val.trim().parse::<i64>() {
                self.batch.jobs = jobs;
            }
        }

        if let Some(overwrite) = env_flag("KELP_OVERWRITE") {
            self.batch.overwrite = overwrite;
        }

        if let Some(progress) = env_flag("KELP_PROGRESS") {
            self.batch.progress = progress;
        }

        if let Ok(val) = env::var("KELP_OUTPUT_DIR") {
            // An empty value clears a remap coming from the config file
            self.batch.output_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = env::var("KELP_JPEG_QUALITY") {
            if let Ok(quality) = val.trim().parse::<i64>() {
                self.jpeg.quality = quality;
            }
        }

        if let Ok(val) = env::var("KELP_LOG_LEVEL") {
            if !val.trim().is_empty() {
                self.log.level = val.trim().to_string();
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

/// Read a boolean environment variable
///
/// Accepts "true", "1", "yes" as true and "false", "0", "no" as false.
/// Anything else is treated as unset.
fn env_flag(name: &str) -> Option<bool> {
    let val = env::var(name).ok()?;
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
