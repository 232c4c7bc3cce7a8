//! Ingestion Service
//!
//! Runs one validated reading through the pipeline:
//! predict -> classify -> alert (awaited) -> forward (detached) -> record.

use crate::error::ApiError;
use alerting::{AlertDispatcher, AlertOutcome, StressClassifier, StressLevel};
use chrono::{Local, Utc};
use cloud_sync::TelemetryForwarder;
use feature_engine::{ExtendedFields, RawReading};
use inference_engine::StressPredictor;
use serde::Serialize;
use std::sync::Arc;
use storage::{ClassificationRecord, Repository, SensorRecord, TelemetryLog};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Most recent classification, fed to live stream clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveSample {
    pub reading: RawReading,
    pub score: f64,
    pub stress_level: StressLevel,
}

/// Result of classifying one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub score: f64,
    pub level: StressLevel,
    pub alert: AlertOutcomeKind,
}

/// Alert outcome without the provider receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcomeKind {
    NotHigh,
    Suppressed,
    Sent,
    Disabled,
    Failed,
}

impl From<&AlertOutcome> for AlertOutcomeKind {
    fn from(outcome: &AlertOutcome) -> Self {
        match outcome {
            AlertOutcome::NotHigh => AlertOutcomeKind::NotHigh,
            AlertOutcome::Suppressed => AlertOutcomeKind::Suppressed,
            AlertOutcome::Sent { .. } => AlertOutcomeKind::Sent,
            AlertOutcome::Disabled => AlertOutcomeKind::Disabled,
            AlertOutcome::Failed => AlertOutcomeKind::Failed,
        }
    }
}

pub struct IngestionService {
    predictor: StressPredictor,
    classifier: StressClassifier,
    dispatcher: Arc<AlertDispatcher>,
    forwarder: Option<Arc<TelemetryForwarder>>,
    repository: Arc<Repository>,
    telemetry_log: Option<Arc<TelemetryLog>>,
    live: watch::Sender<Option<LiveSample>>,
}

impl IngestionService {
    pub fn new(
        predictor: StressPredictor,
        classifier: StressClassifier,
        dispatcher: Arc<AlertDispatcher>,
        repository: Arc<Repository>,
    ) -> Self {
        let (live, _) = watch::channel(None);
        Self {
            predictor,
            classifier,
            dispatcher,
            forwarder: None,
            repository,
            telemetry_log: None,
            live,
        }
    }

    pub fn with_forwarder(mut self, forwarder: Arc<TelemetryForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_telemetry_log(mut self, log: Arc<TelemetryLog>) -> Self {
        self.telemetry_log = Some(log);
        self
    }

    pub fn predictor(&self) -> &StressPredictor {
        &self.predictor
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn classifier(&self) -> &StressClassifier {
        &self.classifier
    }

    /// Receiver for the latest classification; `None` until the first one
    pub fn subscribe_live(&self) -> watch::Receiver<Option<LiveSample>> {
        self.live.subscribe()
    }

    /// Score, classify, alert, forward and record one reading
    pub async fn classify(&self, reading: RawReading) -> Result<Classification, ApiError> {
        let score = self.predictor.predict(&reading)?;
        let level = self.classifier.classify(score);

        let outcome = self.dispatcher.maybe_alert(level).await;
        if matches!(outcome, AlertOutcome::Sent { .. }) {
            metrics::counter!("alerts_sent_total").increment(1);
        }

        if let Some(forwarder) = &self.forwarder {
            forwarder.spawn_forward(reading, score);
        }

        let record = ClassificationRecord {
            id: 0,
            timestamp_ms: Utc::now().timestamp_millis(),
            reading,
            score,
            stress_level: level.as_u8(),
        };
        match self.repository.insert_classification(record) {
            Ok(id) => debug!("Recorded classification {}", id),
            Err(e) => warn!("Failed to record classification: {}", e),
        }

        self.live.send_replace(Some(LiveSample {
            reading,
            score,
            stress_level: level,
        }));

        metrics::counter!("ingest_requests_total", "level" => level.as_str()).increment(1);
        info!(
            "Classified reading hr={} gsr={}: score={:.3} level={}",
            reading.heart_rate,
            reading.gsr,
            score,
            level.as_str()
        );

        Ok(Classification {
            score,
            level,
            alert: AlertOutcomeKind::from(&outcome),
        })
    }

    /// Persist a full device sample, then classify its four base channels
    pub async fn log_sample(
        &self,
        reading: RawReading,
        extended: ExtendedFields,
    ) -> Result<Classification, ApiError> {
        if let Some(log) = &self.telemetry_log {
            if let Err(e) = log.append(Local::now(), &reading, &extended).await {
                warn!("Failed to append telemetry row: {}", e);
            }
        }

        let record = SensorRecord {
            timestamp_ms: Utc::now().timestamp_millis(),
            reading,
            extended,
        };
        if let Err(e) = self.repository.insert_sensor(record) {
            warn!("Failed to record sensor sample: {}", e);
        }

        self.classify(reading).await
    }
}
