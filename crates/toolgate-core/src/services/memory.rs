//! Row memory service
//!
//! Stores JSON rows and answers term searches over their serialized text.
//! Matching is literal substring matching, not similarity search. The
//! store is bounded: once it holds `capacity` rows, storing more evicts the
//! oldest ones.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use super::{optional_usize, unknown_tool};
use crate::error::{GatewayError, GatewayResult};
use crate::service::ToolService;

/// Rows kept by [`MemoryService::new`]
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct MemoryService {
    name: String,
    capacity: usize,
    rows: RwLock<VecDeque<Value>>,
}

impl MemoryService {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    /// A store holding at most `capacity` rows (at least one)
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            rows: RwLock::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows whose text contains every whitespace-separated term of `query`
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<Value> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let limit = limit.unwrap_or(usize::MAX);

        self.rows
            .read()
            .iter()
            .filter(|row| {
                let text = row.to_string().to_lowercase();
                terms.iter().all(|t| text.contains(t.as_str()))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl ToolService for MemoryService {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<String> {
        vec!["store".to_string(), "search".to_string(), "count".to_string()]
    }

    async fn call_tool(&self, tool_name: &str, arguments: &Map<String, Value>) -> GatewayResult<Value> {
        match tool_name {
            "store" => {
                let incoming = match (arguments.get("row"), arguments.get("rows")) {
                    (Some(row), None) => vec![row.clone()],
                    (None, Some(Value::Array(rows))) => rows.clone(),
                    _ => {
                        return Err(GatewayError::InvalidRequest(
                            "Provide either 'row' or an array 'rows'".to_string(),
                        ))
                    }
                };
                let stored = incoming.len();
                let mut rows = self.rows.write();
                rows.extend(incoming);
                let evicted = rows.len().saturating_sub(self.capacity);
                rows.drain(..evicted);
                Ok(json!({"stored": stored, "evicted": evicted, "total": rows.len()}))
            }
            "search" => {
                let query = match arguments.get("query") {
                    None | Some(Value::Null) => "",
                    Some(Value::String(q)) => q.as_str(),
                    Some(_) => {
                        return Err(GatewayError::InvalidRequest(
                            "Argument 'query' must be a string".to_string(),
                        ))
                    }
                };
                let limit = optional_usize(arguments, "limit")?;
                Ok(json!({"rows": self.search(query, limit)}))
            }
            "count" => Ok(json!({"count": self.len()})),
            other => Err(unknown_tool(&self.name, other)),
        }
    }
}
