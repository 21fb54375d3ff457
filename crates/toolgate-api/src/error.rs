//! API error types and conversions

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use toolgate_core::{ErrorKind, GatewayError, TargetFailure};

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// Error raised while dispatching or aggregating
    Gateway(GatewayError),
    /// 400 Bad Request (body could not be parsed)
    BadRequest(String),
    /// 500 Internal Server Error
    Internal(String),
}

/// Standard error response format
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<TargetFailure>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Gateway(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let body = ErrorResponse {
                    error: err.to_string(),
                    kind: err.kind(),
                    backend: err.backend().map(str::to_string),
                    failures: match err {
                        GatewayError::AggregationFailed { failures } => failures,
                        _ => Vec::new(),
                    },
                };
                (status, body)
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg,
                    kind: ErrorKind::InvalidRequest,
                    backend: None,
                    failures: Vec::new(),
                },
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: msg,
                    kind: ErrorKind::Internal,
                    backend: None,
                    failures: Vec::new(),
                },
            ),
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(kind = %body.kind, backend = ?body.backend, message = %body.error, "API error");
        } else if status.is_client_error() {
            tracing::debug!(kind = %body.kind, message = %body.error, "API client error");
        }

        (status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use toolgate_core::UnavailableReason;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unknown_backend_renders_404() {
        let (status, body) =
            render(GatewayError::UnknownBackend("ghost".to_string()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Server 'ghost' not found in config.");
        assert_eq!(body["kind"], "unknown_backend");
        assert_eq!(body["backend"], "ghost");
        assert!(body.get("failures").is_none());
    }

    #[tokio::test]
    async fn unavailable_renders_502() {
        let err = GatewayError::BackendUnavailable {
            backend: "crm".to_string(),
            reason: UnavailableReason::BreakerOpen,
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Gateway could not connect to server 'crm'.");
        assert_eq!(body["kind"], "backend_unavailable");
    }

    #[tokio::test]
    async fn aggregation_failure_lists_targets() {
        let failures = vec![TargetFailure::from_error(
            "a",
            &GatewayError::timeout("a"),
        )];
        let (status, body) = render(GatewayError::AggregationFailed { failures }.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["failures"][0]["backend"], "a");
        assert_eq!(body["failures"][0]["kind"], "backend_unavailable");
    }

    #[tokio::test]
    async fn bad_request_has_no_backend() {
        let (status, body) = render(ApiError::BadRequest("missing field".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
        assert!(body.get("backend").is_none());
    }
}
