//! Tool call forwarding

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use toolgate_core::ToolCallRequest;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /tool-call
/// Forward one tool call and relay the backend's status and body.
/// Non-JSON error bodies are relayed as sent, with the backend's content type.
pub async fn tool_call(
    State(state): State<AppState>,
    payload: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = state.router().dispatch_request(&request).await?;

    let status = StatusCode::from_u16(result.status).map_err(|_| {
        ApiError::Internal(format!(
            "Server '{}' returned invalid status {}",
            request.backend_name, result.status
        ))
    })?;

    let Some(raw) = result.raw_body else {
        return Ok((status, Json(result.payload)).into_response());
    };
    let mut response = (status, raw.text).into_response();
    match raw.content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        Some(content_type) => {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    Ok(response)
}
