//! Cloud Telemetry Forwarding
//!
//! Relays each processed reading and its model score to an external
//! channel-update endpoint (ThingSpeak-compatible):
//! - single attempt per update, bounded by a timeout
//! - throttling, non-2xx and network errors are logged and dropped
//! - fire-and-forget entry point for request handlers

use async_trait::async_trait;
use feature_engine::RawReading;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Telemetry forwarding error types
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Channel rejected update ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Channel update rate limit hit")]
    Throttled,

    #[error("Forward timed out after {0}ms")]
    Timeout(u64),
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Channel API base URL; updates go to `{base_url}/update`
    pub base_url: String,
    /// Channel write key
    pub api_key: String,
    pub timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.thingspeak.com".to_string(),
            api_key: String::new(),
            timeout_ms: 3000,
        }
    }
}

/// One channel update: three named numeric fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    /// Galvanic skin response
    pub field1: f64,
    /// Heart rate
    pub field2: f64,
    /// Model score
    pub field3: f64,
}

impl ChannelUpdate {
    pub fn from_reading(reading: &RawReading, score: f64) -> Self {
        Self {
            field1: reading.gsr,
            field2: reading.heart_rate,
            field3: score,
        }
    }
}

/// Destination for channel updates
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Publish one update; returns the channel's entry id
    async fn publish(&self, update: &ChannelUpdate) -> Result<u64, ForwardError>;
}

/// HTTP client for the channel-update endpoint
pub struct ChannelClient {
    config: TelemetryConfig,
    client: reqwest::Client,
}

impl ChannelClient {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TelemetrySink for ChannelClient {
    async fn publish(&self, update: &ChannelUpdate) -> Result<u64, ForwardError> {
        let url = format!("{}/update", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .query(&[
                ("api_key", self.config.api_key.clone()),
                ("field1", update.field1.to_string()),
                ("field2", update.field2.to_string()),
                ("field3", update.field3.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ForwardError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ForwardError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        // The channel answers 200 with entry id 0 when an update is refused
        match body.trim().parse::<u64>() {
            Ok(0) => Err(ForwardError::Throttled),
            Ok(entry_id) => Ok(entry_id),
            Err(_) => Err(ForwardError::Rejected {
                status: status.as_u16(),
                message: format!("unexpected response body: {body}"),
            }),
        }
    }
}

/// Result of a forward attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Delivered { entry_id: u64 },
    Throttled,
    Failed,
}

/// Best-effort relay of readings and scores to a telemetry sink
pub struct TelemetryForwarder {
    sink: Arc<dyn TelemetrySink>,
    timeout: Duration,
}

impl TelemetryForwarder {
    pub fn new(sink: Arc<dyn TelemetrySink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Build an HTTP forwarder from config, or `None` when disabled
    pub fn from_config(config: &TelemetryConfig) -> Option<Self> {
        if !config.enabled {
            info!("Telemetry forwarding disabled");
            return None;
        }
        if config.api_key.is_empty() {
            warn!("Telemetry forwarding enabled without an api_key; updates will be rejected");
        }
        info!("Forwarding telemetry to {}", config.base_url);
        Some(Self::new(
            Arc::new(ChannelClient::new(config.clone())),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// Forward one update. Never fails; problems are logged.
    pub async fn forward(&self, reading: &RawReading, score: f64) -> ForwardOutcome {
        let update = ChannelUpdate::from_reading(reading, score);

        let result = match tokio::time::timeout(self.timeout, self.sink.publish(&update)).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(entry_id) => {
                debug!("Telemetry delivered: entry {}", entry_id);
                ForwardOutcome::Delivered { entry_id }
            }
            Err(ForwardError::Throttled) => {
                debug!("Telemetry update throttled by channel");
                ForwardOutcome::Throttled
            }
            Err(e) => {
                warn!("Telemetry forward failed: {}", e);
                ForwardOutcome::Failed
            }
        }
    }

    /// Forward in a detached task
    pub fn spawn_forward(
        self: &Arc<Self>,
        reading: RawReading,
        score: f64,
    ) -> JoinHandle<ForwardOutcome> {
        let forwarder = Arc::clone(self);
        tokio::spawn(async move { forwarder.forward(&reading, score).await })
    }
}
