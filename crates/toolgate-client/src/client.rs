//! Backend HTTP client implementation

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use toolgate_core::ToolCallPayload;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ClientError, Result};

/// Path, relative to a backend's base URL, that accepts tool calls
pub const TOOL_CALL_PATH: &str = "tool-call";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of a backend response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body parsed as JSON
    Json(Value),
    /// Body that is not valid JSON, kept as text (may be empty)
    Text(String),
}

impl ResponseBody {
    fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    /// The body as JSON, with non-JSON text wrapped in a string value
    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// A backend's answer to one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    /// `Content-Type` header as sent by the backend
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-pooled client shared by every dispatch
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    timeout: Duration,
}

impl BackendClient {
    /// Create a client with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a client with custom timeouts
    ///
    /// `timeout` bounds each whole request, `connect_timeout` only the
    /// connection phase.
    pub fn with_config(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// Per-request timeout applied to every call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Send one tool call to the backend at `base_url`.
    ///
    /// Any HTTP status is returned as a [`BackendResponse`]; only transport
    /// failures (connect errors, timeouts) are errors.
    #[instrument(skip(self, payload), fields(tool = %payload.tool_name))]
    pub async fn call_tool(
        &self,
        base_url: &Url,
        payload: &ToolCallPayload,
    ) -> Result<BackendResponse> {
        let url = endpoint(base_url, TOOL_CALL_PATH)?;
        debug!("Forwarding tool call to {}", url);

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(ClientError::from_transport)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(ClientError::from_transport)?;

        debug!(status, bytes = text.len(), "Backend responded");
        Ok(BackendResponse {
            status,
            content_type,
            body: ResponseBody::parse(text),
        })
    }
}

/// Join `path` onto `base`, treating `base` as a directory
///
/// `http://host/api` + `tool-call` gives `http://host/api/tool-call`.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("http://localhost:9001/api").unwrap();
        assert_eq!(
            endpoint(&base, TOOL_CALL_PATH).unwrap().as_str(),
            "http://localhost:9001/api/tool-call"
        );

        let root = Url::parse("http://localhost:9001").unwrap();
        assert_eq!(
            endpoint(&root, TOOL_CALL_PATH).unwrap().as_str(),
            "http://localhost:9001/tool-call"
        );
    }

    #[test]
    fn body_parsing_falls_back_to_text() {
        assert_eq!(
            ResponseBody::parse("{\"a\":1}".to_string()),
            ResponseBody::Json(json!({"a": 1}))
        );
        assert_eq!(
            ResponseBody::parse("oops".to_string()).into_value(),
            json!("oops")
        );
    }

    #[test]
    fn success_range() {
        let mut response = BackendResponse {
            status: 204,
            content_type: None,
            body: ResponseBody::Text(String::new()),
        };
        assert!(response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let client =
            BackendClient::with_config(Duration::from_secs(2), Duration::from_millis(500)).unwrap();
        // Port 9 (discard) is closed on test machines
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let payload = ToolCallPayload {
            tool_name: "ping".to_string(),
            arguments: Default::default(),
        };

        let err = client.call_tool(&base, &payload).await.unwrap_err();
        assert!(err.into_gateway_error("dead").is_transport_failure());
    }
}
