//! Service Configuration
//!
//! Optional TOML file layered under `STRESS__*` environment variables, e.g.
//! `STRESS__ALERT__COOLDOWN_SECS=0` or `STRESS__TELEMETRY__API_KEY=...`.

use alerting::{AlertConfig, StressThresholds};
use cloud_sync::TelemetryConfig;
use config::{Config, ConfigError, Environment, File};
use inference_engine::ArtifactPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "STRESS_CONFIG";
/// Config file used when `STRESS_CONFIG` is unset; absence is not an error
pub const DEFAULT_CONFIG_PATH: &str = "stress-pipeline.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ArtifactPaths,
    pub thresholds: StressThresholds,
    pub alert: AlertConfig,
    pub telemetry: TelemetryConfig,
    pub stream: StreamConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5500".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Where WebSocket frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    /// Randomized `[heart_rate, gsr, cortisol]` demo values
    #[default]
    Synthetic,
    /// Latest ingested `[heart_rate, gsr, score]`
    Live,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub interval_ms: u64,
    /// A frame write slower than this drops the client
    pub write_timeout_ms: u64,
    pub source: StreamSource,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            write_timeout_ms: 5000,
            source: StreamSource::Synthetic,
        }
    }
}

impl StreamConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// CSV telemetry log; empty disables it
    pub csv_path: String,
    /// Readings and classifications kept in memory
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            csv_path: "sensor_data.csv".to_string(),
            history_limit: 10_000,
        }
    }
}

impl StorageConfig {
    pub fn csv_path(&self) -> Option<PathBuf> {
        let path = self.csv_path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Load configuration from `STRESS_CONFIG` (or the default file) and the environment
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(Path::new(&path))
}

/// Load configuration from an explicit file path plus the environment
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("STRESS")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?
        .try_deserialize()
}
