//! Configuration management for pacer.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional YAML file, then `PACER_`-prefixed environment variables using
//! `__` between sections (`PACER_THROTTLE__RATE_KBPS=64`). Command-line flags
//! are applied on top by the binary.

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{PacerError, Result};
use crate::throttle::Rate;

/// Main configuration for pacer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacerConfig {
    /// Throttling configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Target rate in kilobits per second
    #[serde(default = "default_rate_kbps")]
    pub rate_kbps: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rate_kbps: default_rate_kbps(),
        }
    }
}

fn default_rate_kbps() -> f64 {
    64.0
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `pacer=trace`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PacerConfig {
    /// Load configuration from an optional YAML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration from a YAML string, without consulting the environment.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Self::finish(settings)
    }

    /// Like [`load`](Self::load), but reads variables from `env` when given
    /// instead of the process environment.
    fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            let name = path.to_str().ok_or_else(|| {
                PacerError::Config(format!("Path is not valid UTF-8: {}", path.display()))
            })?;
            builder = builder.add_source(File::new(name, FileFormat::Yaml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("PACER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        Self::finish(settings)
    }

    fn finish(settings: Config) -> Result<Self> {
        let config: PacerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the loaded values are usable.
    pub fn validate(&self) -> Result<()> {
        self.rate().map(|_| ())
    }

    /// The configured rate as a validated [`Rate`].
    pub fn rate(&self) -> Result<Rate> {
        Rate::from_kbps(self.throttle.rate_kbps)
    }
}
