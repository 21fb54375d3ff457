//! End-to-end tests for the toolgate gateway
//!
//! Each test starts one or more stub backends speaking the `/tool-call`
//! protocol, points a gateway at them, and exercises the gateway's REST API
//! with a plain HTTP client.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use toolgate_api::{create_router, AppState};
use toolgate_client::testing::TestServer;
use toolgate_client::BackendClient;
use toolgate_core::{BreakerConfig, BreakerSet, ServiceRegistry};
use toolgate_gateway::{GatewayConfig, GatewayRouter};
use url::Url;

// Nothing listens on the discard port on test machines
const DEAD_BACKEND: &str = "http://127.0.0.1:9";

// =============================================================================
// Stub backend
// =============================================================================

#[derive(Clone, Default)]
struct Stub {
    rows: Vec<Value>,
    calls: Arc<Mutex<Vec<Value>>>,
}

async fn stub_tool_call(State(stub): State<Stub>, Json(body): Json<Value>) -> Response {
    stub.calls.lock().push(body.clone());

    match body["tool_name"].as_str() {
        Some("echo") => Json(json!({"echo": body["arguments"]})).into_response(),
        Some("search") => Json(json!({"rows": stub.rows})).into_response(),
        Some("fail") => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"detail": "maintenance"})),
        )
            .into_response(),
        Some("html") => (StatusCode::OK, "<html>oops</html>").into_response(),
        Some("crash") => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "no such tool"}))).into_response(),
    }
}

async fn start_stub(rows: Vec<Value>) -> (TestServer, Stub) {
    let stub = Stub {
        rows,
        ..Stub::default()
    };
    let router = Router::new()
        .route("/tool-call", post(stub_tool_call))
        .with_state(stub.clone());
    let server = TestServer::start(router).await.unwrap();
    (server, stub)
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    gateway: TestServer,
    alpha: Stub,
    _alpha_server: TestServer,
    _beta_server: TestServer,
}

impl Harness {
    async fn new() -> Self {
        let (alpha_server, alpha) =
            start_stub(vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})]).await;
        let (beta_server, _beta) =
            start_stub(vec![json!({"name": "b", "id": 2}), json!({"id": 3, "name": "c"})]).await;

        let registry = Arc::new(ServiceRegistry::new());
        registry.initialize();

        let client =
            BackendClient::with_config(Duration::from_secs(2), Duration::from_millis(500)).unwrap();
        let router = GatewayRouter::new(client)
            .with_registry(registry)
            .with_call_timeout(Duration::from_secs(2))
            .with_breakers(BreakerSet::new(BreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
            }))
            .with_backend("alpha", alpha_server.url().unwrap())
            .with_backend("beta", beta_server.url().unwrap())
            .with_backend("dead", Url::parse(DEAD_BACKEND).unwrap());

        let gateway = TestServer::start(create_router(AppState::new(Arc::new(router))))
            .await
            .unwrap();

        Self {
            gateway,
            alpha,
            _alpha_server: alpha_server,
            _beta_server: beta_server,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .gateway
            .client
            .post(self.gateway.endpoint(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        read(response).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .gateway
            .client
            .get(self.gateway.endpoint(path))
            .send()
            .await
            .unwrap();
        read(response).await
    }

    async fn tool_call(&self, server: &str, tool: &str, arguments: Value) -> (StatusCode, Value) {
        self.post(
            "/tool-call",
            json!({"server": server, "tool_name": tool, "arguments": arguments}),
        )
        .await
    }

    async fn tool_call_raw(&self, server: &str, tool: &str) -> reqwest::Response {
        self.gateway
            .client
            .post(self.gateway.endpoint("/tool-call"))
            .json(&json!({"server": server, "tool_name": tool, "arguments": {}}))
            .send()
            .await
            .unwrap()
    }

    async fn breaker(&self, backend: &str) -> Value {
        let (_, body) = self.get("/breakers").await;
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|b| b["backend"] == backend)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

async fn read(response: reqwest::Response) -> (StatusCode, Value) {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let text = response.text().await.unwrap();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, body)
}

// =============================================================================
// Tool calls
// =============================================================================

#[tokio::test]
async fn tool_call_round_trips_through_backend() {
    let harness = Harness::new().await;

    let (status, body) = harness.tool_call("alpha", "echo", json!({"q": "rust"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"echo": {"q": "rust"}}));
    assert_eq!(
        harness.alpha.calls.lock().clone(),
        vec![json!({"tool_name": "echo", "arguments": {"q": "rust"}})]
    );
}

#[tokio::test]
async fn unknown_server_is_404() {
    let harness = Harness::new().await;

    let (status, body) = harness.tool_call("unknown-backend", "echo", json!({})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Server 'unknown-backend' not found in config.");
    assert_eq!(body["kind"], "unknown_backend");
}

#[tokio::test]
async fn backend_error_status_is_forwarded_verbatim() {
    let harness = Harness::new().await;

    for _ in 0..3 {
        let (status, body) = harness.tool_call("alpha", "fail", json!({})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"detail": "maintenance"}));
    }

    let breaker = harness.breaker("alpha").await;
    assert_eq!(breaker["state"], "closed");
    assert_eq!(breaker["failure_count"], 0);
}

#[tokio::test]
async fn backend_text_error_body_is_relayed_unchanged() {
    let harness = Harness::new().await;

    let response = harness.tool_call_raw("alpha", "crash").await;

    assert_eq!(response.status().as_u16(), 500);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();
    assert!(content_type.starts_with("text/plain"), "content-type was {content_type}");
    assert_eq!(response.text().await.unwrap(), "Internal Server Error");
    assert_eq!(harness.breaker("alpha").await["state"], "closed");
}

#[tokio::test]
async fn backend_json_error_keeps_json_content_type() {
    let harness = Harness::new().await;

    let response = harness.tool_call_raw("alpha", "fail").await;

    assert_eq!(response.status().as_u16(), 503);
    assert_eq!(
        response.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn non_json_success_is_a_protocol_error() {
    let harness = Harness::new().await;

    let (status, body) = harness.tool_call("alpha", "html", json!({})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "backend_protocol");
    assert_eq!(body["backend"], "alpha");
    assert_eq!(harness.breaker("alpha").await["state"], "closed");
}

#[tokio::test]
async fn unreachable_backend_opens_its_breaker() {
    let harness = Harness::new().await;

    for _ in 0..2 {
        let (status, body) = harness.tool_call("dead", "echo", json!({})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Gateway could not connect to server 'dead'.");
        assert_eq!(body["kind"], "backend_unavailable");
    }
    assert_eq!(harness.breaker("dead").await["state"], "open");

    // Rejected by the open breaker; same wire shape
    let (status, body) = harness.tool_call("dead", "echo", json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["backend"], "dead");

    // Other backends are unaffected
    let (status, _) = harness.tool_call("alpha", "echo", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(harness.breaker("alpha").await["state"], "closed");
}

#[tokio::test]
async fn malformed_request_is_400() {
    let harness = Harness::new().await;

    let response = harness
        .gateway
        .client
        .post(harness.gateway.endpoint("/tool-call"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn fan_out_merges_dedups_and_reports_failures() {
    let harness = Harness::new().await;

    let (status, body) = harness
        .post(
            "/fan-out",
            json!({"targets": ["alpha", "dead", "beta"], "tool_name": "search", "arguments": {"q": "x"}}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["results"],
        json!([
            {"id": 1, "name": "a"},
            {"id": 2, "name": "b"},
            {"id": 3, "name": "c"}
        ])
    );
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["failures"][0]["backend"], "dead");
    assert_eq!(body["failures"][0]["kind"], "backend_unavailable");
}

#[tokio::test]
async fn fan_out_mixes_remote_and_in_process_targets() {
    let harness = Harness::new().await;

    harness
        .tool_call("memory", "store", json!({"rows": [{"id": 9, "name": "z"}]}))
        .await;

    let (status, body) = harness
        .post(
            "/fan-out",
            json!({"targets": ["memory", "alpha"], "tool_name": "search", "arguments": {}}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0], json!({"id": 9, "name": "z"}));
    assert_eq!(body["results"].as_array().unwrap().len(), 3);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn fan_out_with_every_target_down_is_502() {
    let harness = Harness::new().await;

    let (status, body) = harness
        .post(
            "/fan-out",
            json!({"targets": ["dead", "ghost"], "tool_name": "search"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "aggregation_failed");
    let failed: Vec<&str> = body["failures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["backend"].as_str().unwrap())
        .collect();
    assert_eq!(failed, vec!["dead", "ghost"]);
}

#[tokio::test]
async fn fan_out_rejects_empty_targets() {
    let harness = Harness::new().await;

    let (status, body) = harness
        .post("/fan-out", json!({"targets": [], "tool_name": "search"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

// =============================================================================
// Health and configuration
// =============================================================================

#[tokio::test]
async fn health_lists_remote_and_in_process_servers() {
    let harness = Harness::new().await;

    let (status, body) = harness.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "healthy",
            "discovered_servers": ["alpha", "beta", "cache", "dead", "etl", "memory"]
        })
    );
}

#[tokio::test]
async fn gateway_built_from_config_file() {
    let (stub_server, stub) = start_stub(vec![json!({"id": 1})]).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "[client]\ncall_timeout_ms = 2000\n\n[backends.search]\nurl = \"{}\"\nfailure_threshold = 3\n\n[services]\nbuiltin = false\n",
        stub_server.base_url()
    )
    .unwrap();

    let config = GatewayConfig::load(file.path()).unwrap();
    let client = BackendClient::with_config(config.call_timeout(), config.connect_timeout()).unwrap();
    let router = GatewayRouter::from_config(&config, client, None);
    assert_eq!(router.backend_names(), vec!["search"]);

    let gateway = TestServer::start(create_router(AppState::new(Arc::new(router))))
        .await
        .unwrap();
    let response = gateway
        .client
        .post(gateway.endpoint("/tool-call"))
        .json(&json!({"server": "search", "tool_name": "search", "arguments": {}}))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"rows": [{"id": 1}]}));
    assert_eq!(stub.calls.lock().len(), 1);

    let response = gateway
        .client
        .get(gateway.endpoint("/breakers"))
        .send()
        .await
        .unwrap();
    let (_, breakers) = read(response).await;
    assert_eq!(breakers["items"][0]["failure_threshold"], 3);
}
