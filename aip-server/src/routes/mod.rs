pub mod chat;
pub mod history;

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

pub async fn root() -> &'static str {
    "AI Platform Server is running!"
}

pub async fn server_status() -> &'static str {
    "AI Platform Server Endpoint is running!"
}

/// Bare `OPTIONS`; CORS headers are added by the router layers.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: String,
    pub model: String,
    pub upstream: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let upstream = state.llm.health_check().await.unwrap_or(false);
    Json(HealthResponse {
        status: "ok",
        provider: state.llm.provider().to_string(),
        model: state.llm.model_name().to_string(),
        upstream,
    })
}
