//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use pillars_types::error::DraftError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Draft store, recovery or validation failure.
    Draft(DraftError),
    /// Request validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<DraftError> for AppError {
    fn from(e: DraftError) -> Self {
        AppError::Draft(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Draft(DraftError::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                "DRAFT_NOT_FOUND",
                format!("No active draft for {what}"),
            ),
            AppError::Draft(DraftError::Invalid(msg)) | AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Draft(e @ DraftError::Persistence(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR", e.to_string())
            }
            AppError::Draft(e @ DraftError::Recovery(_)) => {
                (StatusCode::BAD_GATEWAY, "RECOVERY_ERROR", e.to_string())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "request failed");
        }
        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string());
        (status, Json(body)).into_response()
    }
}
