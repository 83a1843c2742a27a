//! HTTP server.
//!
//! Provides endpoints for:
//! - Starting runs (`/v1/runs`, `/start-act`)
//! - Run list, detail and cancellation (`/v1/runs/:run_id`)
//! - Per-run WebSocket channel (`/ws/run/:run_id`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        // API routes
        .route("/v1/runs", post(handlers::start_run).get(handlers::list_runs))
        .route("/v1/runs/:run_id", get(handlers::get_run))
        .route("/v1/runs/:run_id/cancel", post(handlers::cancel_run))
        .route("/start-act", post(handlers::start_run))
        // Channel routes
        .route("/ws/run/:run_id", get(handlers::run_channel))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::engine::ApprovalPolicy;
    use crate::http::responses::{CancelRunResponse, ErrorResponse, StartRunResponse};
    use actrelay_core::RunStatus;

    fn test_state() -> Arc<AppState> {
        AppState::dry_run(&ServerConfig {
            step_delay: Duration::from_secs(60),
            approval_policy: ApprovalPolicy::Never,
            ..Default::default()
        })
    }

    fn router(state: &Arc<AppState>) -> Router {
        create_router(Arc::clone(state), CorsLayer::permissive())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let response = router(&state).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_get_unknown_run_is_404() {
        let state = test_state();
        let response = router(&state)
            .oneshot(get_request("/v1/runs/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "Run not found: missing");
    }

    #[tokio::test]
    async fn test_start_get_and_cancel_run() {
        let state = test_state();

        let response = router(&state)
            .oneshot(post_json(
                "/v1/runs",
                r#"{"url":"https://example.com","steps":["open menu"]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let StartRunResponse { run_id }: StartRunResponse = body_json(response).await;

        let response = router(&state)
            .oneshot(get_request(&format!("/v1/runs/{run_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["run_id"], run_id.as_str());
        assert_eq!(body["metadata"]["url"], "https://example.com");
        assert_eq!(body["attached"], false);

        let response = router(&state)
            .oneshot(post_json(&format!("/v1/runs/{run_id}/cancel"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body: CancelRunResponse = body_json(response).await;
        assert_eq!(body.status, RunStatus::Cancelled);

        let response = router(&state)
            .oneshot(post_json(&format!("/v1/runs/{run_id}/cancel"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_start_act_alias_and_list() {
        let state = test_state();

        let response = router(&state)
            .oneshot(post_json(
                "/start-act",
                r#"{"url":"https://example.com","context":"be careful","steps":[]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router(&state).oneshot(get_request("/v1/runs")).await.unwrap();
        let runs: Vec<serde_json::Value> = body_json(response).await;
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_start_run_rejects_empty_url() {
        let state = test_state();
        let response = router(&state)
            .oneshot(post_json("/v1/runs", r#"{"url":"  ","steps":["x"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_404() {
        let state = test_state();
        let response = router(&state)
            .oneshot(post_json("/v1/runs/missing/cancel", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = test_state();
        let response = router(&state).oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("actrelay_runs_total"));
    }
}
