//! Reading ingestion: collaborator-posted readings and synthetic test data.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use integrisense_core::classification::StreamPayload;
use integrisense_core::error::NormalizeError;
use integrisense_core::synthetic::synthetic_reading;

use crate::error::AppResult;
use crate::handlers::parse_json;
use crate::state::AppState;

/// POST /sensor-data
///
/// Normalize the posted reading, classify and broadcast it, and return the
/// broadcast payload.
pub async fn receive_sensor_data(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<StreamPayload>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(NormalizeError::EmptyPayload.into());
    }
    let value: serde_json::Value = parse_json(&body)?;
    if value.is_null() {
        return Err(NormalizeError::EmptyPayload.into());
    }

    let reading = state.normalizer.from_network(&value)?;
    let result = state.pipeline.process(reading).await;
    Ok(Json(result.payload()))
}

/// POST /test-data
///
/// Run a random reading through the full pipeline. Diagnostic only.
pub async fn generate_test_data(State(state): State<AppState>) -> Json<StreamPayload> {
    let reading = synthetic_reading(&mut rand::rng());
    tracing::debug!("Generated synthetic reading");
    let result = state.pipeline.process(reading).await;
    Json(result.payload())
}
