//! Fan-out aggregation
//!
//! Sends one logical query to several backends concurrently and merges the
//! rows that come back. A failing target only removes its own rows from the
//! result; the call fails as a whole only when every target failed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tokio::time::Instant;
use toolgate_core::{
    FanOutQuery, FanOutResult, GatewayError, GatewayResult, TargetFailure, ToolCallResult,
};
use tracing::{debug, info, warn};

use crate::router::GatewayRouter;

/// Keys under which a backend may return its rows inside an object payload
pub const ROW_KEYS: [&str; 3] = ["rows", "results", "items"];

/// Something that can answer a fan-out query for one backend
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Rows `backend` returns for `query`
    async fn query_rows(&self, backend: &str, query: &FanOutQuery) -> GatewayResult<Vec<Value>>;
}

#[async_trait]
impl<S: RowSource + ?Sized> RowSource for Arc<S> {
    async fn query_rows(&self, backend: &str, query: &FanOutQuery) -> GatewayResult<Vec<Value>> {
        (**self).query_rows(backend, query).await
    }
}

#[async_trait]
impl RowSource for GatewayRouter {
    async fn query_rows(&self, backend: &str, query: &FanOutQuery) -> GatewayResult<Vec<Value>> {
        let result = self
            .dispatch(backend, &query.tool_name, &query.arguments)
            .await?;
        extract_rows(backend, result)
    }
}

/// Pull the row list out of a tool call result.
///
/// Accepts a bare JSON array, or an object holding an array under one of
/// [`ROW_KEYS`].
pub fn extract_rows(backend: &str, result: ToolCallResult) -> GatewayResult<Vec<Value>> {
    if !result.success {
        return Err(GatewayError::BackendStatus {
            backend: backend.to_string(),
            status: result.status,
        });
    }

    match result.payload {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut object) => ROW_KEYS
            .iter()
            .find_map(|key| match object.remove(*key) {
                Some(Value::Array(rows)) => Some(rows),
                _ => None,
            })
            .ok_or_else(|| no_rows(backend)),
        _ => Err(no_rows(backend)),
    }
}

fn no_rows(backend: &str) -> GatewayError {
    GatewayError::BackendProtocol {
        backend: backend.to_string(),
        message: format!("payload has no row list (expected an array or one of {:?})", ROW_KEYS),
    }
}

/// Fans queries out over a [`RowSource`]
pub struct ResultAggregator<S> {
    source: S,
}

impl<S: RowSource> ResultAggregator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Query every target concurrently and merge their rows.
    ///
    /// Rows keep target declaration order, then each backend's own order;
    /// duplicates are dropped by [`content_key`]. Targets still running
    /// when `query.deadline` passes fail with `DeadlineExceeded`. Returns
    /// `AggregationFailed` only when no target succeeded.
    pub async fn fan_out(&self, query: &FanOutQuery, targets: &[String]) -> GatewayResult<FanOutResult> {
        if targets.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Fan-out requires at least one target".to_string(),
            ));
        }

        let deadline = query.deadline.map(|d| Instant::now() + d);
        debug!(
            tool = %query.tool_name,
            targets = targets.len(),
            "Fanning out query"
        );

        let outcomes = join_all(
            targets
                .iter()
                .map(|backend| self.query_target(backend, query, deadline)),
        )
        .await;

        merge(targets, outcomes)
    }

    async fn query_target(
        &self,
        backend: &str,
        query: &FanOutQuery,
        deadline: Option<Instant>,
    ) -> GatewayResult<Vec<Value>> {
        let rows = self.source.query_rows(backend, query);
        match deadline {
            None => rows.await,
            Some(at) => tokio::time::timeout_at(at, rows).await.unwrap_or_else(|_| {
                Err(GatewayError::DeadlineExceeded {
                    backend: backend.to_string(),
                })
            }),
        }
    }
}

fn merge(targets: &[String], outcomes: Vec<GatewayResult<Vec<Value>>>) -> GatewayResult<FanOutResult> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut failures = Vec::new();
    let mut succeeded = 0;

    for (backend, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(batch) => {
                succeeded += 1;
                debug!(backend = %backend, rows = batch.len(), "Fan-out target answered");
                rows.extend(batch.into_iter().filter(|row| seen.insert(content_key(row))));
            }
            Err(e) => {
                warn!(backend = %backend, kind = %e.kind(), error = %e, "Fan-out target failed");
                failures.push(TargetFailure::from_error(backend, &e));
            }
        }
    }

    if succeeded == 0 {
        warn!(targets = targets.len(), "Every fan-out target failed");
        return Err(GatewayError::AggregationFailed { failures });
    }

    if failures.is_empty() {
        info!(succeeded, rows = rows.len(), "Fan-out complete");
    } else {
        warn!(
            succeeded,
            failed = failures.len(),
            rows = rows.len(),
            "Partial fan-out result"
        );
    }

    Ok(FanOutResult {
        rows,
        succeeded,
        failures,
    })
}

/// Canonical text of a row used for deduplication.
///
/// Object keys are sorted at every level, so rows that differ only in field
/// order collide. Values are compared exactly: `1` and `"1"` stay distinct.
pub fn content_key(row: &Value) -> String {
    let mut out = String::new();
    write_canonical(row, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            out.push_str(&scalar.to_string());
        }
    }
}
