//! toolgate-api - REST API layer for the toolgate gateway
//!
//! Exposes a [`GatewayRouter`](toolgate_gateway::GatewayRouter) over HTTP.
//!
//! # Usage
//!
//! ```ignore
//! use toolgate_api::{create_router, AppState};
//!
//! let router = Arc::new(GatewayRouter::from_config(&config, client, Some(registry)));
//! let app = create_router(AppState::new(router));
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/breakers", get(handlers::health::breakers))
        .route("/tool-call", post(handlers::tool_call::tool_call))
        .route("/fan-out", post(handlers::fan_out::fan_out))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use toolgate_client::BackendClient;
    use toolgate_core::ServiceRegistry;
    use toolgate_gateway::GatewayRouter;
    use tower::ServiceExt;

    fn app() -> Router {
        let registry = Arc::new(ServiceRegistry::new());
        registry.initialize();
        let router = GatewayRouter::new(BackendClient::new().unwrap()).with_registry(registry);
        create_router(AppState::new(Arc::new(router)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_lists_dispatchable_names() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "healthy", "discovered_servers": ["cache", "etl", "memory"]})
        );
    }

    #[tokio::test]
    async fn tool_call_reaches_in_process_service() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/tool-call",
            Some(json!({"server": "cache", "tool_name": "set", "arguments": {"key": "k", "value": [1]}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/tool-call",
            Some(json!({"server": "cache", "tool_name": "get", "arguments": {"key": "k"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], json!([1]));
    }

    #[tokio::test]
    async fn unknown_server_is_404() {
        let (status, body) = send(
            &app(),
            "POST",
            "/tool-call",
            Some(json!({"server": "unknown-backend", "tool_name": "x", "arguments": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Server 'unknown-backend' not found in config.");
        assert_eq!(body["kind"], "unknown_backend");
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (status, body) = send(
            &app(),
            "POST",
            "/tool-call",
            Some(json!({"tool_name": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn fan_out_reports_partial_failures() {
        let app = app();
        send(
            &app,
            "POST",
            "/tool-call",
            Some(json!({"server": "memory", "tool_name": "store", "arguments": {"rows": [{"id": 1}]}})),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/fan-out",
            Some(json!({"targets": ["memory", "nowhere"], "tool_name": "search", "arguments": {}})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!([{"id": 1}]));
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["failed"], 1);
        assert_eq!(body["failures"][0]["backend"], "nowhere");
        assert_eq!(body["failures"][0]["kind"], "unknown_backend");
    }

    #[tokio::test]
    async fn fan_out_with_no_successes_is_502() {
        let (status, body) = send(
            &app(),
            "POST",
            "/fan-out",
            Some(json!({"targets": ["x", "y"], "tool_name": "search"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "aggregation_failed");
        assert_eq!(body["failures"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn breakers_lists_called_backends() {
        let app = app();
        send(
            &app,
            "POST",
            "/tool-call",
            Some(json!({"server": "cache", "tool_name": "keys"})),
        )
        .await;

        let (status, body) = send(&app, "GET", "/breakers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["backend"], "cache");
        assert_eq!(body["items"][0]["state"], "closed");
    }
}
