//! ToolService trait - the in-process backend abstraction

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::GatewayResult;

/// A backend that lives inside the gateway process
///
/// Instances are built by the [`ServiceRegistry`](crate::registry::ServiceRegistry)
/// and dispatched to by the router exactly like remote backends.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Registered service name
    fn name(&self) -> &str;

    /// Tools this service answers to
    fn tools(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time setup, run by the registry right after construction
    async fn initialize(&self) -> GatewayResult<()> {
        Ok(())
    }

    /// Run `tool_name` with `arguments` and return its JSON result
    async fn call_tool(&self, tool_name: &str, arguments: &Map<String, Value>)
        -> GatewayResult<Value>;
}
