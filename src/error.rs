//! Error handling

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::inference::network::NetworkError;
use crate::inference::scaler::ScalerError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Request validation errors
    Validation {
        status: StatusCode,
        message: String,
    },

    // Scaler errors
    ScalerNotFitted,
    Scaling(String),

    // Inference errors
    ShapeMismatch {
        input: Vec<usize>,
        reconstructed: Vec<usize>,
    },
    Inference(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AppError::Validation { status, message } => {
                tracing::debug!("Request validation failed: {}", message);
                (*status, message.clone())
            }
            AppError::ScalerNotFitted => {
                tracing::error!("Scaler has not been fitted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error: scaler has not been fitted".to_string(),
                )
            }
            AppError::Scaling(msg) => {
                tracing::error!("Scaling error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error during data scaling".to_string(),
                )
            }
            AppError::ShapeMismatch {
                input,
                reconstructed,
            } => {
                tracing::error!(
                    "Shape mismatch: input {:?}, reconstructed {:?}",
                    input,
                    reconstructed
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!(
                        "Data processing error: shape mismatch between input {:?} and reconstruction {:?}",
                        input, reconstructed
                    ),
                )
            }
            AppError::Inference(msg) => {
                tracing::error!("Inference error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Model inference error: {}", msg),
                )
            }
        };

        let body = Json(json!({ "detail": detail }));

        (status, body).into_response()
    }
}

impl From<ScalerError> for AppError {
    fn from(err: ScalerError) -> Self {
        match err {
            ScalerError::NotFitted => AppError::ScalerNotFitted,
            other => AppError::Scaling(other.to_string()),
        }
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        AppError::Inference(err.to_string())
    }
}

/// JSON extractor that reports rejections in the service's error shape:
/// a malformed or incomplete body becomes a 4xx response whose JSON body
/// carries a `detail` string, like every other non-200 response.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::Validation {
                status: rejection.status(),
                message: rejection.body_text(),
            }),
        }
    }
}
