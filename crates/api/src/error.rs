use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use integrisense_classifier::ModelError;
use integrisense_core::error::{CoreError, NormalizeError};
use integrisense_device::DeviceError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of each crate and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `integrisense_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An ingestion payload that could not be normalized.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Normalize(err) => normalize_rejection(err),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::Normalize(err) => normalize_rejection(err),

            // --- Device errors ---
            AppError::Device(err) => match err {
                DeviceError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                other => internal(&other.to_string()),
            },

            // --- Model errors ---
            AppError::Model(err) => match err {
                ModelError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                other => internal(&other.to_string()),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Rejected ingestion payloads echo the normalizer's message verbatim, e.g.
/// `Missing required field: bvp`.
fn normalize_rejection(err: &NormalizeError) -> (StatusCode, &'static str, String) {
    tracing::debug!(error = %err, "Rejected ingestion payload");
    (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
}

/// Log the cause and return a sanitized 500.
fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
