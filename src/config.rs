//! Configuration module

use std::env;
use std::path::PathBuf;

/// Default listen port, matching the deployed service.
pub const DEFAULT_PORT: u16 = 8081;

const MODEL_FILE: &str = "transformer_autoencoder.safetensors";
const SCALER_FILE: &str = "scaler.json";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Path to the autoencoder weight file
    pub model_path: PathBuf,

    /// Path to the persisted scaler parameters
    pub scaler_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base = install_dir().join("model");

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),

            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base.join(MODEL_FILE)),

            scaler_path: env::var("SCALER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| base.join(SCALER_FILE)),
        }
    }
}

/// Directory the service binary was installed to. The weight and scaler
/// files live in a `model/` directory next to the executable.
fn install_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
