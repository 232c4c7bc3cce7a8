//! Validation Error Types

use thiserror::Error;

/// Errors during payload validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Wrong number of sensor values
    #[error("Invalid sensor data: expected exactly {expected} values, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    /// A value could not be read as a number
    #[error("Invalid sensor data: {field} is not numeric ({value})")]
    NotNumeric { field: String, value: String },

    /// NaN or infinite value
    #[error("Invalid sensor data: {field} must be a finite number")]
    NonFinite { field: String },

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}
