use aip_common::AipError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures a handler can answer with. Bodies are always `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The provider failed; carries the provider's error text.
    Upstream(String),
    /// Anything else. The detail is logged, callers only see a generic message.
    Internal(String),
}

impl From<AipError> for ApiError {
    fn from(err: AipError) -> Self {
        if let Some(text) = err.upstream_text() {
            return ApiError::Upstream(text.to_string());
        }
        match err {
            AipError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Upstream(text) => {
                tracing::warn!(error = %text, "api.upstream_failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to get response from Model: {text}"),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "api.internal_error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
