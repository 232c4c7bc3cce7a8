//! Ingestion Routes
//!
//! `GET /sensor_data?s1=..&s4=..`, `POST /sensor_data` and the device's
//! `POST /log` all end in the same classification pipeline.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;
use alerting::StressLevel;
use data_validator::ValidationError;
use feature_engine::{ExtendedFields, RawReading};

/// JSON ingestion body
#[derive(Debug, Deserialize)]
pub struct SensorPayload {
    pub sensor_values: Option<Vec<Value>>,
}

/// Full device sample posted to `/log`
#[derive(Debug, Default, Deserialize)]
pub struct LogPayload {
    #[serde(rename = "IR")]
    pub ir: Option<f64>,
    #[serde(rename = "Red")]
    pub red: Option<f64>,
    #[serde(rename = "HeartRate")]
    pub heart_rate: Option<f64>,
    #[serde(rename = "GSR")]
    pub gsr: Option<f64>,
    #[serde(rename = "SpO2")]
    pub spo2: Option<f64>,
    #[serde(rename = "AccelX")]
    pub accel_x: Option<f64>,
    #[serde(rename = "AccelY")]
    pub accel_y: Option<f64>,
    #[serde(rename = "AccelZ")]
    pub accel_z: Option<f64>,
    #[serde(rename = "GyroX")]
    pub gyro_x: Option<f64>,
    #[serde(rename = "GyroY")]
    pub gyro_y: Option<f64>,
    #[serde(rename = "GyroZ")]
    pub gyro_z: Option<f64>,
    #[serde(rename = "Temp")]
    pub temp: Option<f64>,
}

impl LogPayload {
    fn extended(&self) -> ExtendedFields {
        ExtendedFields {
            spo2: self.spo2,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            gyro_x: self.gyro_x,
            gyro_y: self.gyro_y,
            gyro_z: self.gyro_z,
            temp: self.temp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub status: &'static str,
    pub stress_level: StressLevel,
}

/// Classify positional query parameters
pub async fn get_sensor_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let reading = state.validator.parse_query(&params)?;
    let classification = state.ingestion.classify(reading).await?;

    Ok(Json(ClassifyResponse {
        status: "success",
        stress_level: classification.level,
    }))
}

/// Classify a JSON `sensor_values` array
pub async fn post_sensor_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SensorPayload>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let Json(payload) = payload?;
    let values = payload
        .sensor_values
        .ok_or_else(|| ValidationError::MissingField("sensor_values".to_string()))?;

    let reading = state.validator.parse_json_values(&values)?;
    let classification = state.ingestion.classify(reading).await?;

    Ok(Json(ClassifyResponse {
        status: "success",
        stress_level: classification.level,
    }))
}

/// Persist a full device sample, then classify it
pub async fn post_log(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LogPayload>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let Json(payload) = payload?;

    let validator = &state.validator;
    let reading = RawReading::new(
        validator.require_field("IR", payload.ir)?,
        validator.require_field("Red", payload.red)?,
        validator.require_field("HeartRate", payload.heart_rate)?,
        validator.require_field("GSR", payload.gsr)?,
    );

    let classification = state.ingestion.log_sample(reading, payload.extended()).await?;

    Ok(Json(ClassifyResponse {
        status: "logged",
        stress_level: classification.level,
    }))
}
