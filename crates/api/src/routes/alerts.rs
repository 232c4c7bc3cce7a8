//! Alert Routes

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::AppState;
use alerting::AlertStatus;

/// Alert gate state and delivery counters
pub async fn get_alerts(State(state): State<Arc<AppState>>) -> Json<AlertStatus> {
    Json(state.ingestion.dispatcher().status())
}
