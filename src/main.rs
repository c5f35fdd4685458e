//! Vehicle Telemetry Anomaly Detection Service
//!
//! Scores incoming vehicle telemetry records with a pretrained transformer
//! autoencoder: reconstruction error above a fixed threshold flags the
//! record as anomalous.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     VTA CLOUD                          │
//! ├────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌──────────────────┐  │
//! │  │  API     │   │  Feature  │   │  Autoencoder     │  │
//! │  │  (Axum)  │──▶│  Scaler   │──▶│  (ndarray)       │  │
//! │  └──────────┘   └───────────┘   └──────────────────┘  │
//! │        startup: load weights + scaler, build context   │
//! └────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod inference;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
use inference::detector::AnomalyDetector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "vta_cloud=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    let device = inference::detect_device();
    tracing::info!("VTA Cloud starting (inference device: {})", device);

    // Model weights are mandatory: refuse to serve with a broken model.
    let network = match inference::loader::load_network(&config.model_path) {
        Ok(network) => network,
        Err(e) => {
            tracing::error!(
                "Failed to load model from {}: {}",
                config.model_path.display(),
                e
            );
            return Err(e.into());
        }
    };

    // The scaler degrades to a synthetic fit so startup never blocks on it.
    let scaler =
        inference::scaler::load_or_fit(&config.scaler_path, inference::features::FEATURE_COUNT);

    // Build application state
    let state = AppState {
        detector: Arc::new(AnomalyDetector::new(network, scaler, device)),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Shared application state: the immutable inference context, built once
/// at startup and handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<AnomalyDetector>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/detect-anomaly/", post(handlers::detect::detect))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
