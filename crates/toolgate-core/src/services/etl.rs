//! ETL adapter service
//!
//! Projects and renames fields of JSON object rows, and can load the
//! transformed rows into the cache service it depends on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{required, required_str, unknown_tool};
use crate::error::{GatewayError, GatewayResult};
use crate::service::ToolService;

pub struct EtlService {
    name: String,
    cache: Arc<dyn ToolService>,
}

/// Field projection and renaming applied to each row
#[derive(Debug)]
struct Transform {
    fields: Option<Vec<String>>,
    rename: Map<String, Value>,
}

impl Transform {
    fn from_args(args: &Map<String, Value>) -> GatewayResult<Self> {
        let fields = match args.get("fields") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|f| {
                        f.as_str().map(str::to_string).ok_or_else(|| {
                            GatewayError::InvalidRequest(
                                "Argument 'fields' must contain strings".to_string(),
                            )
                        })
                    })
                    .collect::<GatewayResult<Vec<_>>>()?,
            ),
            Some(_) => {
                return Err(GatewayError::InvalidRequest(
                    "Argument 'fields' must be an array".to_string(),
                ))
            }
        };

        let rename = match args.get("rename") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(GatewayError::InvalidRequest(
                    "Argument 'rename' must be an object".to_string(),
                ))
            }
        };

        Ok(Self { fields, rename })
    }

    fn apply(&self, row: &Value) -> GatewayResult<Value> {
        let object = row.as_object().ok_or_else(|| {
            GatewayError::InvalidRequest("Every row must be a JSON object".to_string())
        })?;

        let mut out = Map::new();
        for (key, value) in object {
            if let Some(fields) = &self.fields {
                if !fields.iter().any(|f| f == key) {
                    continue;
                }
            }
            let target = self
                .rename
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(key.as_str());
            out.insert(target.to_string(), value.clone());
        }
        Ok(Value::Object(out))
    }
}

impl EtlService {
    pub fn new(name: impl Into<String>, cache: Arc<dyn ToolService>) -> Self {
        Self {
            name: name.into(),
            cache,
        }
    }

    fn transform(&self, args: &Map<String, Value>) -> GatewayResult<Vec<Value>> {
        let rows = required(args, "rows")?.as_array().ok_or_else(|| {
            GatewayError::InvalidRequest("Argument 'rows' must be an array".to_string())
        })?;
        let transform = Transform::from_args(args)?;
        rows.iter().map(|row| transform.apply(row)).collect()
    }
}

#[async_trait]
impl ToolService for EtlService {
    fn name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> Vec<String> {
        vec!["transform".to_string(), "load".to_string()]
    }

    async fn call_tool(&self, tool_name: &str, arguments: &Map<String, Value>) -> GatewayResult<Value> {
        match tool_name {
            "transform" => Ok(json!({"rows": self.transform(arguments)?})),
            "load" => {
                let key = required_str(arguments, "key")?;
                let rows = self.transform(arguments)?;
                let loaded = rows.len();

                let mut set = Map::new();
                set.insert("key".to_string(), json!(key));
                set.insert("value".to_string(), Value::Array(rows));
                self.cache.call_tool("set", &set).await?;

                Ok(json!({"key": key, "loaded": loaded}))
            }
            other => Err(unknown_tool(&self.name, other)),
        }
    }
}
