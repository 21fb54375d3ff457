//! Built-in in-process services
//!
//! Registered by [`ServiceRegistry::initialize`](crate::registry::ServiceRegistry::initialize):
//!
//! - `cache` - key/value store
//! - `memory` - bounded row memory with term search
//! - `etl` - row projection and loading into `cache`

mod cache;
mod etl;
mod memory;

use std::sync::Arc;

use serde_json::{Map, Value};

pub use cache::CacheService;
pub use etl::EtlService;
pub use memory::MemoryService;

use crate::error::{GatewayError, GatewayResult};
use crate::models::ServiceDescriptor;
use crate::registry::ServiceRegistry;
use crate::service::ToolService;

pub const CACHE: &str = "cache";
pub const MEMORY: &str = "memory";
pub const ETL: &str = "etl";

pub(crate) fn register_builtins(registry: &ServiceRegistry) {
    registry.register_factory(CACHE, |_deps| {
        Ok(Arc::new(CacheService::new(CACHE)) as Arc<dyn ToolService>)
    });
    registry.register_factory(MEMORY, |_deps| {
        Ok(Arc::new(MemoryService::new(MEMORY)) as Arc<dyn ToolService>)
    });
    registry.register_factory(ETL, |deps| {
        let cache = deps.get(CACHE)?;
        Ok(Arc::new(EtlService::new(ETL, cache)) as Arc<dyn ToolService>)
    });

    registry.register(ServiceDescriptor::singleton(CACHE));
    registry.register(ServiceDescriptor::singleton(MEMORY));
    registry.register(ServiceDescriptor::singleton(ETL).with_dependency(CACHE));
}

fn unknown_tool(service: &str, tool: &str) -> GatewayError {
    GatewayError::InvalidRequest(format!(
        "Unknown tool '{}' on service '{}'",
        tool, service
    ))
}

fn required<'a>(args: &'a Map<String, Value>, key: &str) -> GatewayResult<&'a Value> {
    args.get(key)
        .ok_or_else(|| GatewayError::InvalidRequest(format!("Missing argument '{}'", key)))
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> GatewayResult<&'a str> {
    required(args, key)?
        .as_str()
        .ok_or_else(|| GatewayError::InvalidRequest(format!("Argument '{}' must be a string", key)))
}

fn optional_usize(args: &Map<String, Value>, key: &str) -> GatewayResult<Option<usize>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "Argument '{}' must be a non-negative integer",
                key
            ))
        }),
    }
}
