//! Fan-out query handler

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use toolgate_core::{FanOutQuery, TargetFailure};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FanOutRequest {
    /// Backends to query, in result order
    pub targets: Vec<String>,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Deadline for the whole fan-out in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FanOutResponse {
    pub results: Vec<Value>,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<TargetFailure>,
}

impl FanOutRequest {
    fn query(&self) -> FanOutQuery {
        let query = FanOutQuery::new(self.tool_name.clone(), self.arguments.clone());
        match self.deadline_ms {
            Some(ms) => query.with_deadline(Duration::from_millis(ms)),
            None => query,
        }
    }
}

/// POST /fan-out
/// Query several backends and return the merged rows
pub async fn fan_out(
    State(state): State<AppState>,
    payload: Result<Json<FanOutRequest>, JsonRejection>,
) -> Result<Json<FanOutResponse>, ApiError> {
    let Json(request) = payload?;
    let result = state
        .aggregator()
        .fan_out(&request.query(), &request.targets)
        .await?;

    Ok(Json(FanOutResponse {
        failed: result.failed_count(),
        results: result.rows,
        succeeded: result.succeeded,
        failures: result.failures,
    }))
}
