//! Anomaly detection pipeline
//!
//! One immutable context per process: extract → standardize → reconstruct →
//! threshold. Requests share it read-only; there is no cross-request state
//! beyond the latency counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use ndarray::{ArrayView1, Axis};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::TelemetryRecord;

use super::features;
use super::network::{reconstruction_mse, TransformerAutoencoder};
use super::scaler::StandardScaler;

/// Reconstruction-error threshold the model was calibrated against.
/// Scores strictly above it are anomalous.
pub const MSE_THRESHOLD: f32 = 0.1;

/// Outcome of scoring one record.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceResult {
    pub vehicle_id: String,
    pub is_anomaly: bool,
    pub mse: f32,
}

impl InferenceResult {
    pub fn status_label(&self) -> &'static str {
        if self.is_anomaly {
            "anomalous"
        } else {
            "normal"
        }
    }
}

/// Engine status for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub inference_device: &'static str,
    pub threshold: f32,
    pub feature_count: usize,
    pub feature_layout: [&'static str; features::FEATURE_COUNT],
    pub max_seq_len: usize,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
}

/// Immutable inference context: pretrained network, fitted scaler and the
/// device they compute on. Built once at startup and shared via `Arc`.
pub struct AnomalyDetector {
    network: TransformerAutoencoder,
    scaler: StandardScaler,
    device: &'static str,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl AnomalyDetector {
    pub fn new(
        network: TransformerAutoencoder,
        scaler: StandardScaler,
        device: &'static str,
    ) -> Self {
        if !scaler.is_fitted() {
            tracing::warn!("Detector constructed with an unfitted scaler; requests will fail");
        }
        Self {
            network,
            scaler,
            device,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    /// `true` when a reconstruction error counts as anomalous.
    pub fn classify(mse: f32) -> bool {
        mse > MSE_THRESHOLD
    }

    /// Score one telemetry record.
    pub fn detect(&self, record: &TelemetryRecord) -> AppResult<InferenceResult> {
        let start = Instant::now();

        let (features, vehicle_id) = features::extract(record);
        let standardized = self.scaler.transform(ArrayView1::from(&features[..]))?;

        // A single record is a sequence of length 1.
        let input = standardized.insert_axis(Axis(0));
        let reconstructed = self.network.forward(&input)?;

        if reconstructed.dim() != input.dim() {
            let (rows, cols) = reconstructed.dim();
            let (in_rows, in_cols) = input.dim();
            return Err(AppError::ShapeMismatch {
                input: vec![in_rows, in_cols],
                reconstructed: vec![rows, cols],
            });
        }

        let mse = reconstruction_mse(&reconstructed, &input);

        self.latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Vehicle {}: mse {:.6}", vehicle_id, mse);

        Ok(InferenceResult {
            vehicle_id: vehicle_id.to_string(),
            is_anomaly: Self::classify(mse),
            mse,
        })
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 {
            (sum as f32 / count as f32) / 1000.0
        } else {
            0.0
        };

        EngineStatus {
            inference_device: self.device,
            threshold: MSE_THRESHOLD,
            feature_count: features::FEATURE_COUNT,
            feature_layout: features::FEATURE_LAYOUT,
            max_seq_len: self.network.max_seq_len(),
            avg_latency_ms: avg,
            inference_count: count,
        }
    }
}
