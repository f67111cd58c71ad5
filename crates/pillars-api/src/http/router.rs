//! Axum router configuration with middleware.
//!
//! All draft routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/owners/{owner}/assessments/{key}",
            get(handlers::assessment::get_assessment),
        )
        .route(
            "/owners/{owner}/assessments/{key}/draft",
            put(handlers::assessment::save_draft).delete(handlers::assessment::clear_draft),
        )
        .route(
            "/owners/{owner}/assessments/{key}/finalize",
            post(handlers::assessment::finalize_draft),
        )
        .route(
            "/owners/{owner}/assessments/{key}/recover",
            post(handlers::assessment::recover_draft),
        )
        .route(
            "/owners/{owner}/drafts",
            get(handlers::assessment::list_drafts),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pillars_infra::sqlite::pool::DatabasePool;
    use pillars_types::config::GlobalConfig;
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let data_dir = dir.path().to_path_buf();
        std::mem::forget(dir);
        let pool = DatabasePool::new(&url).await.unwrap();
        AppState::from_parts(pool, GlobalConfig::default(), data_dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    const ASSESSMENT: &str = "/api/v1/owners/user-1/assessments/self_care";

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state().await);
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("ok"));
    }

    #[tokio::test]
    async fn test_fresh_assessment_is_not_started() {
        let app = build_router(test_state().await);
        let (status, body) = send(&app, "GET", ASSESSMENT, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("not_started"));
        assert!(body["data"].get("draft").is_none());
    }

    #[tokio::test]
    async fn test_save_then_view_in_progress() {
        let app = build_router(test_state().await);
        let save = json!({
            "current_step": "2",
            "form_data": {"sleep": 3},
            "device_info": {"platform": "web"},
        });

        let (status, body) = send(&app, "PUT", &format!("{ASSESSMENT}/draft"), Some(save.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["version"], json!(1));
        assert_eq!(body["data"]["assessment_type"], json!("self_care"));
        assert!(body["data"]["metadata"]["device_fingerprint"].is_string());

        let (_, body) = send(&app, "PUT", &format!("{ASSESSMENT}/draft"), Some(save)).await;
        assert_eq!(body["data"]["version"], json!(2));

        let (_, body) = send(&app, "GET", ASSESSMENT, None).await;
        assert_eq!(body["data"]["status"], json!("in_progress"));
        assert_eq!(body["data"]["draft"]["form_data"]["sleep"], json!(3));

        let (_, body) = send(&app, "GET", "/api/v1/owners/user-1/drafts", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_type_is_rejected() {
        let app = build_router(test_state().await);
        let (status, body) = send(
            &app,
            "PUT",
            &format!("{ASSESSMENT}/draft"),
            Some(json!({"assessment_type": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_finalize_then_completed() {
        let app = build_router(test_state().await);
        send(
            &app,
            "PUT",
            &format!("{ASSESSMENT}/draft"),
            Some(json!({"form_data": {"sleep": 3}})),
        )
        .await;

        let (status, body) = send(&app, "POST", &format!("{ASSESSMENT}/finalize"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_draft"], json!(false));

        let (_, body) = send(&app, "GET", ASSESSMENT, None).await;
        assert_eq!(body["data"]["status"], json!("completed"));
    }

    #[tokio::test]
    async fn test_finalize_without_draft_is_404() {
        let app = build_router(test_state().await);
        let (status, body) = send(&app, "POST", &format!("{ASSESSMENT}/finalize"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["code"], json!("DRAFT_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_clear_returns_to_not_started() {
        let app = build_router(test_state().await);
        send(
            &app,
            "PUT",
            &format!("{ASSESSMENT}/draft"),
            Some(json!({"form_data": {"sleep": 3}})),
        )
        .await;

        let (status, body) = send(&app, "DELETE", &format!("{ASSESSMENT}/draft"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], json!(true));

        let (_, body) = send(&app, "GET", ASSESSMENT, None).await;
        assert_eq!(body["data"]["status"], json!("not_started"));

        let (_, body) = send(&app, "DELETE", &format!("{ASSESSMENT}/draft"), None).await;
        assert_eq!(body["data"]["deleted"], json!(false));
    }

    #[tokio::test]
    async fn test_recover_with_nothing_lost_is_null() {
        let app = build_router(test_state().await);
        let (status, body) = send(&app, "POST", &format!("{ASSESSMENT}/recover"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("data").is_none() || body["data"].is_null());
    }
}
