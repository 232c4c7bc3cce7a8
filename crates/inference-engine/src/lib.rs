//! Stress Model Inference
//!
//! Loads the trained artifact (model, fitted scaler, ordered feature names)
//! once at startup and scores readings against it.

mod artifact;
mod engine;
mod model;

pub use artifact::{ArtifactPaths, Scaler, TrainedArtifact};
pub use engine::StressPredictor;
pub use model::{LinearModel, OnnxModel, Regressor};

use thiserror::Error;

/// Errors during artifact loading and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Artifact missing, unreadable or inconsistent; fatal at startup
    #[error("Model unavailable ({path}): {reason}")]
    ModelUnavailable { path: String, reason: String },
    /// Input does not fit the model's feature schema
    #[error("Input schema mismatch: {0}")]
    InputSchema(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

impl InferenceError {
    pub(crate) fn unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        InferenceError::ModelUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
