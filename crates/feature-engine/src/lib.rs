//! Feature Engineering Engine
//!
//! Turns a raw wearable reading into the engineered feature vector the stress
//! model was trained on. The transform must stay in lockstep with the training
//! pipeline: column names, order and arithmetic are part of the model contract.

mod features;
mod reading;

pub use features::{
    engineer, engineer_batch, FeatureVector, ENGINEERED_COLUMNS, RED_ZERO_REPLACEMENT,
};
pub use reading::{ExtendedFields, RawReading, BASE_COLUMNS};

use thiserror::Error;

/// Errors while building readings or feature vectors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Expected {expected} base sensor values, got {actual}")]
    MissingBaseValues { expected: usize, actual: usize },
}
