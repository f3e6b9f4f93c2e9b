use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.assistant.clear_session(&session_id).await {
        return Err(ApiError::NotFound(format!("Session '{}' not found", session_id)));
    }
    Ok(Json(json!({ "status": "cleared", "session_id": session_id })))
}
