//! Append-only CSV telemetry log

use crate::StorageError;
use chrono::{DateTime, Local};
use feature_engine::{ExtendedFields, RawReading};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One CSV row per ingested device sample.
///
/// Columns: timestamp, ir, red, heart_rate, spo2, accel_x, accel_y, accel_z,
/// gyro_x, gyro_y, gyro_z, temp, gsr. Missing optional values are empty.
pub struct TelemetryLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl TelemetryLog {
    /// Open (or create) the log for appending
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        info!("Appending raw telemetry to {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one row; rows from concurrent callers never interleave
    pub async fn append(
        &self,
        timestamp: DateTime<Local>,
        reading: &RawReading,
        extended: &ExtendedFields,
    ) -> Result<(), StorageError> {
        let row = format_row(timestamp, reading, extended);

        let mut file = self.file.lock().await;
        file.write_all(row.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended telemetry row to {}", self.path.display());
        Ok(())
    }
}

/// Render one newline-terminated CSV row
pub fn format_row(
    timestamp: DateTime<Local>,
    reading: &RawReading,
    extended: &ExtendedFields,
) -> String {
    let optional = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

    let columns = [
        timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        reading.ir.to_string(),
        reading.red.to_string(),
        reading.heart_rate.to_string(),
        optional(extended.spo2),
        optional(extended.accel_x),
        optional(extended.accel_y),
        optional(extended.accel_z),
        optional(extended.gyro_x),
        optional(extended.gyro_y),
        optional(extended.gyro_z),
        optional(extended.temp),
        reading.gsr.to_string(),
    ];

    let mut row = columns.join(",");
    row.push('\n');
    row
}
