//! Health and landing-page handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::inference::detector::EngineStatus;
use crate::AppState;

#[derive(Serialize)]
pub struct WelcomeResponse {
    message: &'static str,
}

/// Static landing message; not part of the scoring API proper.
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the anomaly detection API. POST records to /detect-anomaly/",
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    engine: EngineStatus,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        engine: state.detector.status(),
    })
}
