//! Stress Predictor

use crate::artifact::TrainedArtifact;
use crate::InferenceError;
use feature_engine::{engineer, FeatureVector, RawReading};
use std::sync::Arc;
use tracing::debug;

/// Scores readings against a shared, read-only trained artifact.
///
/// Cloning is cheap; every clone points at the same artifact.
#[derive(Debug, Clone)]
pub struct StressPredictor {
    artifact: Arc<TrainedArtifact>,
}

impl StressPredictor {
    pub fn new(artifact: Arc<TrainedArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    /// Engineer, reconcile, scale and score one reading
    pub fn predict(&self, reading: &RawReading) -> Result<f64, InferenceError> {
        self.predict_features(&engineer(reading))
    }

    /// Score positional values `[ir, red, heart_rate, gsr]`
    pub fn predict_values(&self, values: &[f64]) -> Result<f64, InferenceError> {
        let reading = RawReading::from_values(values)
            .map_err(|e| InferenceError::InputSchema(e.to_string()))?;
        self.predict(&reading)
    }

    /// Score an engineered vector, aligning it to the fitted schema first
    pub fn predict_features(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let start = std::time::Instant::now();

        let aligned = features.reconcile(self.artifact.feature_names());
        let scaled = self.artifact.scaler().transform(aligned.values())?;
        let score = self.artifact.model().predict(&scaled)?;

        if !score.is_finite() {
            return Err(InferenceError::InferenceFailed(format!(
                "model produced non-finite score {score}"
            )));
        }

        debug!("Inference completed in {}us, score={:.4}", start.elapsed().as_micros(), score);
        Ok(score)
    }
}
