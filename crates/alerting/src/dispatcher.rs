//! Alert Dispatcher

use crate::classifier::StressLevel;
use crate::manager::{AlertConfig, AlertGate, GateDecision};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from an outbound notification
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider rejected notification ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Notification timed out after {0}ms")]
    Timeout(u64),
}

/// Outbound emergency notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the configured emergency message; returns a provider receipt id
    async fn notify(&self) -> Result<String, DispatchError>;
}

/// Result of one `maybe_alert` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Level below HIGH
    NotHigh,
    /// Covered by a recent notification
    Suppressed,
    /// Notification accepted by the provider
    Sent { receipt: String },
    /// HIGH, but no notifier is configured
    Disabled,
    /// Delivery failed; logged and swallowed
    Failed,
}

/// Counters and gate state for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct AlertStatus {
    pub state: &'static str,
    pub cooldown_secs: u64,
    pub sent: u64,
    pub suppressed: u64,
    pub failed: u64,
}

/// Sends at most one notification per cooldown window for HIGH stress
pub struct AlertDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    gate: Mutex<AlertGate>,
    timeout: Duration,
    sent: AtomicU64,
    suppressed: AtomicU64,
    failed: AtomicU64,
}

impl AlertDispatcher {
    pub fn new(notifier: Option<Arc<dyn Notifier>>, config: &AlertConfig) -> Self {
        if notifier.is_none() {
            warn!("No alert notifier configured; HIGH stress will only be logged");
        }
        Self {
            notifier,
            gate: Mutex::new(AlertGate::new(config.cooldown())),
            timeout: config.timeout(),
            sent: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Notify if `level` is HIGH and the gate allows it. Never fails.
    pub async fn maybe_alert(&self, level: StressLevel) -> AlertOutcome {
        // Gate lock is released before any network call
        let decision = self.gate().on_level(level);

        let sent_at = match decision {
            GateDecision::Ignore => return AlertOutcome::NotHigh,
            GateDecision::Suppress => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!("HIGH stress alert suppressed: in cooldown period");
                return AlertOutcome::Suppressed;
            }
            GateDecision::Send { at } => at,
        };

        let Some(notifier) = self.notifier.as_ref() else {
            warn!("HIGH stress detected but alert notifier is disabled");
            return AlertOutcome::Disabled;
        };

        let result = match tokio::time::timeout(self.timeout, notifier.notify()).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(receipt) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                info!("HIGH stress alert sent: {}", receipt);
                AlertOutcome::Sent { receipt }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.gate().rollback(sent_at);
                warn!("HIGH stress alert failed: {}", e);
                AlertOutcome::Failed
            }
        }
    }

    pub fn status(&self) -> AlertStatus {
        let gate = self.gate();
        AlertStatus {
            state: gate.state().name(),
            cooldown_secs: gate.cooldown().as_secs(),
            sent: self.sent.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn gate(&self) -> MutexGuard<'_, AlertGate> {
        // The gate holds plain state; a panic mid-transition leaves it usable
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
