//! Liveness endpoint.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde_json::json;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /health - Report liveness and database reachability.
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    sqlx::query("SELECT 1")
        .execute(&state.db_pool.reader)
        .await
        .map_err(|e| AppError::Internal(format!("database unavailable: {e}")))?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
        request_id,
        elapsed,
    )))
}
