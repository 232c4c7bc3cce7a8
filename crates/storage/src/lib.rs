//! Storage Layer
//!
//! Append-only CSV log of raw device telemetry, plus a bounded in-memory
//! history of recent readings and classifications for the dashboard.

mod csv_log;
mod repository;

pub use csv_log::{format_row, TelemetryLog};
pub use repository::{ClassificationRecord, Repository, SensorRecord};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lock error: {0}")]
    Lock(String),
}
