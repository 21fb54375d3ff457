//! In-memory key/value cache service

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};

use super::{required, required_str, unknown_tool};
use crate::error::GatewayResult;
use crate::service::ToolService;

/// Key/value store exposed through the `get`, `set`, `delete`, and `keys` tools
pub struct CacheService {
    name: String,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl CacheService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ToolService for CacheService {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<String> {
        ["get", "set", "delete", "keys"]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    async fn call_tool(&self, tool_name: &str, arguments: &Map<String, Value>) -> GatewayResult<Value> {
        match tool_name {
            "get" => {
                let key = required_str(arguments, "key")?;
                let value = self.entries.read().get(key).cloned();
                Ok(json!({
                    "key": key,
                    "found": value.is_some(),
                    "value": value.unwrap_or(Value::Null),
                }))
            }
            "set" => {
                let key = required_str(arguments, "key")?;
                let value = required(arguments, "value")?.clone();
                self.entries.write().insert(key.to_string(), value);
                Ok(json!({"key": key, "stored": true}))
            }
            "delete" => {
                let key = required_str(arguments, "key")?;
                let deleted = self.entries.write().remove(key).is_some();
                Ok(json!({"key": key, "deleted": deleted}))
            }
            "keys" => {
                let keys: Vec<String> = self.entries.read().keys().cloned().collect();
                Ok(json!({"keys": keys}))
            }
            other => Err(unknown_tool(&self.name, other)),
        }
    }
}
