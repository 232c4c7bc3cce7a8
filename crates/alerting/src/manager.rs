//! Alert Gate
//!
//! Debounces HIGH stress notifications with a cooldown state machine:
//!
//! ```text
//! Idle --High--> Alerted --below High--> CoolingDown --cooldown elapsed--> Idle
//!                  ^  |                       |
//!                  |  +-- High, cooldown      +-- High within cooldown
//!                  |      elapsed: re-send        (suppressed) --> Alerted
//! ```

use crate::classifier::StressLevel;
use crate::sms::SmsConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Alert configuration
///
/// The default 300s cooldown sends one notification per episode of sustained
/// HIGH stress. Set `cooldown_secs = 0` to notify on every HIGH classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum spacing between notifications; 0 alerts on every HIGH
    pub cooldown_secs: u64,
    /// Upper bound on a single notification call
    pub timeout_ms: u64,
    /// SMS provider; alerts are only logged while it is unconfigured
    pub sms: SmsConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 300,
            timeout_ms: 5000,
            sms: SmsConfig::default(),
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Current gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    /// Last notification sent at `at`; stress still HIGH
    Alerted { at: Instant },
    /// Stress dropped below HIGH after a notification at `at`
    CoolingDown { at: Instant },
}

impl GateState {
    pub fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Alerted { .. } => "alerted",
            GateState::CoolingDown { .. } => "cooling_down",
        }
    }
}

/// What the gate decided for one classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Level below HIGH; nothing to send
    Ignore,
    /// HIGH, notification due; `at` identifies this send for `rollback`
    Send { at: Instant },
    /// HIGH, but a recent notification covers it
    Suppress,
}

/// Cooldown state machine for HIGH stress notifications
#[derive(Debug)]
pub struct AlertGate {
    cooldown: Duration,
    state: GateState,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        info!("Creating alert gate with cooldown {:?}", cooldown);
        Self {
            cooldown,
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Feed one classification through the gate
    pub fn on_level(&mut self, level: StressLevel) -> GateDecision {
        self.on_level_at(level, Instant::now())
    }

    /// Feed one classification observed at `now`
    pub fn on_level_at(&mut self, level: StressLevel, now: Instant) -> GateDecision {
        let high = level == StressLevel::High;
        let expired = |at: Instant| now.saturating_duration_since(at) >= self.cooldown;

        let (next, decision) = match self.state {
            GateState::Idle if high => {
                (GateState::Alerted { at: now }, GateDecision::Send { at: now })
            }
            GateState::Idle => (GateState::Idle, GateDecision::Ignore),

            GateState::Alerted { at } | GateState::CoolingDown { at } if high => {
                if expired(at) {
                    (GateState::Alerted { at: now }, GateDecision::Send { at: now })
                } else {
                    (GateState::Alerted { at }, GateDecision::Suppress)
                }
            }
            GateState::Alerted { at } | GateState::CoolingDown { at } => {
                if expired(at) {
                    (GateState::Idle, GateDecision::Ignore)
                } else {
                    (GateState::CoolingDown { at }, GateDecision::Ignore)
                }
            }
        };

        if next != self.state {
            debug!("Alert gate: {} -> {}", self.state.name(), next.name());
        }
        self.state = next;
        decision
    }

    /// Forget the undelivered notification sent at `at` so the next HIGH retries.
    /// No-op once a later send has replaced it.
    pub fn rollback(&mut self, at: Instant) {
        match self.state {
            GateState::Alerted { at: current } | GateState::CoolingDown { at: current }
                if current == at =>
            {
                debug!("Alert gate rolled back to idle after failed delivery");
                self.state = GateState::Idle;
            }
            _ => debug!("Alert gate kept: failed delivery superseded by a later send"),
        }
    }
}
