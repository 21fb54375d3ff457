//! Tool call models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorKind, GatewayError};

/// Inbound request to invoke a tool on a named backend
///
/// Transient: built per call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Backend the call is routed to
    #[serde(rename = "server", alias = "backend_name")]
    pub backend_name: String,
    /// Tool to invoke on the backend
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(
        backend_name: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            backend_name: backend_name.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// The outbound wire payload for this request
    pub fn payload(&self) -> ToolCallPayload {
        ToolCallPayload {
            tool_name: self.tool_name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Body sent to a backend: `{"tool_name": ..., "arguments": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Error details attached to an unsuccessful [`ToolCallResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub message: String,
}

impl From<&GatewayError> for ErrorInfo {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            backend: err.backend().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Normalized outcome of a dispatched tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// True when the backend answered with a 2xx status
    pub success: bool,
    /// Status reported by the backend (200 for in-process services)
    pub status: u16,
    /// Parsed response body, forwarded verbatim
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Undecoded body of a non-JSON backend response, kept for passthrough
    #[serde(skip)]
    pub raw_body: Option<RawBody>,
}

/// A response body exactly as the backend sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBody {
    pub content_type: Option<String>,
    pub text: String,
}

impl ToolCallResult {
    /// Successful call with a 200 status
    pub fn ok(payload: Value) -> Self {
        Self::with_status(200, payload)
    }

    /// Successful call with an explicit 2xx status
    pub fn with_status(status: u16, payload: Value) -> Self {
        Self {
            success: true,
            status,
            payload,
            error: None,
            raw_body: None,
        }
    }

    /// Backend responded, but with a non-success status
    pub fn backend_status(backend: &str, status: u16, payload: Value) -> Self {
        let err = GatewayError::BackendStatus {
            backend: backend.to_string(),
            status,
        };
        Self {
            success: false,
            status,
            payload,
            error: Some(ErrorInfo::from(&err)),
            raw_body: None,
        }
    }

    /// Attach the backend's undecoded body
    pub fn with_raw_body(mut self, content_type: Option<String>, text: impl Into<String>) -> Self {
        self.raw_body = Some(RawBody {
            content_type,
            text: text.into(),
        });
        self
    }
}
