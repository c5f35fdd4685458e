//! Anomaly detection handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppJson;
use crate::models::TelemetryRecord;
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub message: String,
}

/// Score one telemetry record and report the verdict.
pub async fn detect(
    State(state): State<AppState>,
    AppJson(record): AppJson<TelemetryRecord>,
) -> AppResult<Json<DetectResponse>> {
    let result = state.detector.detect(&record)?;

    tracing::info!(
        "Vehicle {}: {} (mse {:.6})",
        result.vehicle_id,
        result.status_label(),
        result.mse
    );

    Ok(Json(DetectResponse {
        message: format!(
            "Vehicle ID: {}, status: {}, mse: {}",
            result.vehicle_id,
            result.status_label(),
            result.mse
        ),
    }))
}
