//! Route handlers

pub mod health;
pub mod task;

use axum::{
    extract::DefaultBodyLimit, handler::HandlerWithoutStateExt, http::StatusCode, Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use task::ErrorResponse;

async fn route_not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Route not found".to_string(),
        }),
    )
}

/// Assemble the full application: API routes, static client bundle and the
/// JSON 404 for everything else
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config().public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(route_not_found.into_service());
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .merge(health::router())
        .merge(task::router())
        .fallback_service(static_files)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::build_router;
    use crate::{config::ServerConfig, state::AppState};

    async fn build_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let public_dir = temp_dir.path().join("public");
        std::fs::create_dir_all(&public_dir).unwrap();
        std::fs::write(public_dir.join("index.html"), "<h1>Tasks</h1>").unwrap();

        let config = ServerConfig {
            data_dir: temp_dir.path().join("data"),
            public_dir,
            ..ServerConfig::default()
        };
        (AppState::new(config).await.unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn unmatched_route_returns_json_404() {
        let (state, _tmp) = build_state().await;
        let app = build_router(state);

        for (method, uri) in [("GET", "/api/nope"), ("POST", "/nowhere")] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let payload: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(payload["error"], "Route not found");
        }
    }

    #[tokio::test]
    async fn serves_client_bundle_at_root() {
        let (state, _tmp) = build_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>Tasks</h1>");
    }

    #[tokio::test]
    async fn health_reports_attachment_mode() {
        let (state, _tmp) = build_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["attachmentMode"], "blob");
    }
}
