//! API Errors

use alerting::ThresholdError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use data_validator::ValidationError;
use inference_engine::InferenceError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use tracing::{error, warn};

/// Request-time failures, rendered as `{"error": "<message>"}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid sensor data: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(InferenceError::InputSchema(_)) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            metrics::counter!("ingest_rejected_total").increment(1);
            warn!("Rejected request: {}", self);
        } else {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures that prevent the service from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Model(#[from] InferenceError),

    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
