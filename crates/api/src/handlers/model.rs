//! Handlers for the active classifier.

use axum::extract::State;
use axum::Json;
use integrisense_classifier::ModelMetadata;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Active model description. Metadata fields are absent when no model is
/// loaded.
#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(flatten)]
    pub metadata: Option<ModelMetadata>,
    pub artifact_path: String,
}

fn describe(state: &AppState) -> ModelResponse {
    let handle = state.lifecycle.slot().snapshot();
    ModelResponse {
        loaded: handle.is_some(),
        kind: handle.as_ref().map(|h| h.kind()),
        metadata: handle.map(|h| h.metadata().clone()),
        artifact_path: state.lifecycle.artifact_path().display().to_string(),
    }
}

/// GET /model
pub async fn get_model(State(state): State<AppState>) -> Json<ModelResponse> {
    Json(describe(&state))
}

/// POST /model/reload
///
/// Re-read the artifact and hot-swap it in. On failure the previous model
/// stays active.
pub async fn reload_model(State(state): State<AppState>) -> AppResult<Json<ModelResponse>> {
    let metadata = state.lifecycle.reload().await?;
    tracing::info!(version = metadata.version, "Model reloaded on request");
    Ok(Json(describe(&state)))
}
