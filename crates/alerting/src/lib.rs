//! Alerting System
//!
//! Maps model scores to stress levels and sends emergency notifications for
//! HIGH stress, debounced so sustained stress does not flood the recipient.

mod classifier;
mod dispatcher;
mod manager;
mod sms;

pub use classifier::{StressClassifier, StressLevel, StressThresholds, ThresholdError};
pub use dispatcher::{AlertDispatcher, AlertOutcome, AlertStatus, DispatchError, Notifier};
pub use manager::{AlertConfig, AlertGate, GateDecision, GateState};
pub use sms::{SmsConfig, SmsNotifier};
