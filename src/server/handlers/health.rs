use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = state.assistant.index();
    let store = index.store().name().to_string();
    let api_key = if state.config.llm.api_key.trim().is_empty() {
        "missing"
    } else {
        "configured"
    };

    match index.course_count().await {
        Ok(courses_loaded) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "vector_store": store,
                "courses_loaded": courses_loaded,
                "api_key": api_key,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check could not reach the vector store: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "vector_store": store,
                    "api_key": api_key,
                    "error": e.to_string(),
                })),
            )
        }
    }
}
