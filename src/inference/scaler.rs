//! Feature standardization
//!
//! Per-feature `(x - mean) / std` with the moments fitted once at startup.
//! Loading degrades to a synthetic fit so the service never refuses to
//! start over a missing scaler file; the scores are meaningless until a
//! real scaler is supplied, which is logged loudly.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rows of synthetic data used for the fallback fit.
const SYNTHETIC_ROWS: usize = 100;

#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("scaler has not been fitted")]
    NotFitted,

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Persisted scaler parameters (`scaler.json`).
#[derive(Debug, Serialize, Deserialize)]
struct ScalerFile {
    mean: Vec<f32>,
    std: Vec<f32>,
}

/// Standardizes features by removing the mean and scaling to unit variance.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f32>>,
    std: Option<Array1<f32>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scaler from persisted moments. Zero standard deviations are
    /// clamped to 1.0 so transform never divides by zero.
    pub fn from_params(mean: Array1<f32>, std: Array1<f32>) -> Self {
        Self {
            mean: Some(mean),
            std: Some(clamp_std(std)),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.std.is_some()
    }

    /// Compute per-column mean and standard deviation over a batch.
    pub fn fit(&mut self, data: &Array2<f32>) {
        let (mean, std) = moments(data);
        self.mean = Some(mean);
        self.std = Some(std);
    }

    /// Standardize one feature vector.
    pub fn transform(&self, x: ArrayView1<f32>) -> Result<Array1<f32>, ScalerError> {
        let (mean, std) = match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => (mean, std),
            _ => return Err(ScalerError::NotFitted),
        };

        if x.len() != mean.len() {
            return Err(ScalerError::DimensionMismatch {
                expected: mean.len(),
                actual: x.len(),
            });
        }

        Ok((&x - mean) / std)
    }

    /// Fit on a batch, then return the standardized batch.
    pub fn fit_transform(&mut self, data: &Array2<f32>) -> Array2<f32> {
        let (mean, std) = moments(data);
        let out = (data - &mean) / &std;
        self.mean = Some(mean);
        self.std = Some(std);
        out
    }
}

fn moments(data: &Array2<f32>) -> (Array1<f32>, Array1<f32>) {
    let mean = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()));
    // Population std, ddof = 0.
    let std = clamp_std(data.std_axis(Axis(0), 0.0));
    (mean, std)
}

fn clamp_std(std: Array1<f32>) -> Array1<f32> {
    std.mapv(|s| if s == 0.0 { 1.0 } else { s })
}

/// Load the persisted scaler, or fit one on synthetic standard-normal data
/// when the file is missing, unreadable, or malformed. Never fails.
pub fn load_or_fit(path: &Path, dim: usize) -> StandardScaler {
    match load_from_file(path, dim) {
        Ok(scaler) => {
            tracing::info!("Scaler loaded from {}", path.display());
            scaler
        }
        Err(e) => {
            tracing::warn!(
                "Could not load scaler from {}: {}. Fitting on synthetic data; \
                 scores will be meaningless until a real scaler is supplied.",
                path.display(),
                e
            );
            fit_synthetic(dim)
        }
    }
}

fn load_from_file(path: &Path, dim: usize) -> anyhow::Result<StandardScaler> {
    let raw = std::fs::read_to_string(path)?;
    let file: ScalerFile = serde_json::from_str(&raw)?;

    if file.mean.len() != dim || file.std.len() != dim {
        anyhow::bail!(
            "expected {} entries per vector, got mean={} std={}",
            dim,
            file.mean.len(),
            file.std.len()
        );
    }

    Ok(StandardScaler::from_params(
        Array1::from_vec(file.mean),
        Array1::from_vec(file.std),
    ))
}

fn fit_synthetic(dim: usize) -> StandardScaler {
    let mut rng = rand::thread_rng();
    let samples =
        Array2::from_shape_fn((SYNTHETIC_ROWS, dim), |_| rng.sample::<f32, _>(StandardNormal));

    let mut scaler = StandardScaler::new();
    let standardized = scaler.fit_transform(&samples);
    tracing::debug!(
        "Synthetic scaler fitted on {} rows (standardized mean {:.4})",
        SYNTHETIC_ROWS,
        standardized.mean().unwrap_or(0.0)
    );
    scaler
}
