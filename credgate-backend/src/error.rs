use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use credgate_store::StoreError;

/// Top-level API error shared by all route handlers.
///
/// Display strings double as the caller-visible `error` message, so store
/// and configuration variants keep theirs generic: internal detail is
/// logged at the response boundary and never surfaced.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Server is not configured")]
    Misconfigured,
    #[error("Database error")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Store(err) = &self {
            tracing::error!(error = %err, "store query failed");
        }

        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = json!({ "error": self.to_string() });

        (status, Json(payload)).into_response()
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}
