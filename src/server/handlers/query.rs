use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::assistant::{Answer, AssistantError};
use crate::core::errors::ApiError;
use crate::rag::SourceCitation;
use crate::state::AppState;

const EMPTY_QUERY_ANSWER: &str = "Please enter a question about the course materials.";

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.answer,
            sources: answer.sources,
            session_id: answer.session_id,
            error: None,
        }
    }
}

fn failure(
    status: StatusCode,
    answer: String,
    session_id: Option<String>,
    error: String,
) -> Response {
    let body = QueryResponse {
        answer,
        sources: Vec::new(),
        session_id: session_id.unwrap_or_default(),
        error: Some(error),
    };
    (status, Json(body)).into_response()
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    if !state.allow_query() {
        tracing::warn!("Query rejected by rate limiter");
        return Err(ApiError::TooManyRequests);
    }

    let query = request.query.trim();
    if query.is_empty() {
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            EMPTY_QUERY_ANSWER.to_string(),
            request.session_id,
            "query must not be empty".to_string(),
        ));
    }

    match state.assistant.answer(query, request.session_id.clone()).await {
        Ok(answer) => Ok(Json(QueryResponse::from(answer)).into_response()),
        Err(e) => {
            tracing::error!("Query failed: {}", e);
            let status = match e {
                AssistantError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                AssistantError::Generation(_) => StatusCode::BAD_GATEWAY,
            };
            Ok(failure(status, e.user_message(), request.session_id, e.to_string()))
        }
    }
}
