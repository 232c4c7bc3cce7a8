//! History Routes

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use storage::{ClassificationRecord, SensorRecord};

/// Query parameters for the readings endpoint
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    /// Maximum number of records to return
    #[serde(default = "default_readings_limit")]
    pub limit: usize,
}

fn default_readings_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub data: Vec<SensorRecord>,
    pub meta: ReadingsMeta,
}

#[derive(Debug, Serialize)]
pub struct ReadingsMeta {
    pub count: usize,
    pub limit: usize,
    pub total: usize,
}

/// Most recent raw device samples, newest first
pub async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQuery>,
) -> Json<ReadingsResponse> {
    let repository = state.ingestion.repository();
    let limit = params.limit.min(1000);
    let data = repository.get_sensors(limit).unwrap_or_default();

    Json(ReadingsResponse {
        meta: ReadingsMeta {
            count: data.len(),
            limit,
            total: repository.sensor_count(),
        },
        data,
    })
}

/// Query parameters for the classifications endpoint
#[derive(Debug, Deserialize)]
pub struct ClassificationQuery {
    /// Filter by stress level (0, 1 or 2)
    pub level: Option<u8>,
    /// Maximum number of records
    #[serde(default = "default_classifications_limit")]
    pub limit: usize,
}

fn default_classifications_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub data: Vec<ClassificationRecord>,
    pub count: usize,
}

/// Most recent classifications, newest first
pub async fn get_classifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClassificationQuery>,
) -> Json<ClassificationResponse> {
    let limit = params.limit.min(500);
    let data = state
        .ingestion
        .repository()
        .get_classifications(params.level, limit)
        .unwrap_or_default();

    Json(ClassificationResponse {
        count: data.len(),
        data,
    })
}
