//! Handlers for the device link.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use integrisense_device::{DeviceStatus, SerialConfigUpdate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::parse_json;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /serial/send`.
#[derive(Debug, Deserialize)]
pub struct SendCommandRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfigureResponse {
    pub message: &'static str,
    /// Whether the link was restarted to apply the change.
    pub restarted: bool,
    pub status: DeviceStatus,
}

#[derive(Debug, Serialize)]
pub struct SendCommandResponse {
    pub message: &'static str,
    pub command: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /serial/status
pub async fn get_status(State(state): State<AppState>) -> Json<DeviceStatus> {
    Json(state.device.status().await)
}

/// POST /serial/configure
///
/// Apply a partial configuration. Port, rate or enabled changes restart
/// the link; other fields take effect in place.
pub async fn configure(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ConfigureResponse>> {
    let update: SerialConfigUpdate = parse_json(&body)?;
    let outcome = state.device.configure(update).await?;

    tracing::info!(restarted = outcome.restarted, "Serial configuration updated");

    Ok(Json(ConfigureResponse {
        message: "Serial configuration updated",
        restarted: outcome.restarted,
        status: state.device.status().await,
    }))
}

/// POST /serial/send
///
/// Write one command line to the device.
pub async fn send_command(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<SendCommandResponse>> {
    let request: SendCommandRequest = parse_json(&body)?;
    let command = request
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::BadRequest("Message is required".to_string()))?;

    state.device.send_command(&command).await?;

    Ok(Json(SendCommandResponse {
        message: "Command sent",
        command,
    }))
}
