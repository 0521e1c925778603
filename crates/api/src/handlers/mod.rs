pub mod ingest;
pub mod model;
pub mod serial;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Decode a JSON request body, reporting malformed input in the standard
/// error envelope instead of axum's plain-text rejection.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}
