//! Tool-call router
//!
//! Resolves a backend name to either a remote address or an in-process
//! service, and sends the call through that backend's circuit breaker.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use toolgate_client::{BackendClient, BackendResponse, ResponseBody};
use toolgate_core::{
    BreakerSet, BreakerSnapshot, GatewayError, GatewayResult, ServiceRegistry, ToolCallPayload,
    ToolCallRequest, ToolCallResult, ToolService,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GatewayConfig;

/// Routes tool calls to remote backends and in-process services
///
/// Every dispatch goes through the backend's circuit breaker and is bounded
/// by the router's call timeout. Remote addresses take precedence over
/// registry services of the same name.
pub struct GatewayRouter {
    /// Remote backends by name
    addresses: BTreeMap<String, Url>,
    /// In-process services, consulted when no address matches
    registry: Option<Arc<ServiceRegistry>>,
    /// Shared HTTP client
    client: BackendClient,
    breakers: BreakerSet,
    call_timeout: Duration,
}

enum Target<'a> {
    Remote(&'a Url),
    Local(&'a ServiceRegistry),
}

impl GatewayRouter {
    /// Create a router with no backends and default breaker settings
    pub fn new(client: BackendClient) -> Self {
        let call_timeout = client.timeout();
        Self {
            addresses: BTreeMap::new(),
            registry: None,
            client,
            breakers: BreakerSet::default(),
            call_timeout,
        }
    }

    /// Build a router from loaded configuration
    pub fn from_config(
        config: &GatewayConfig,
        client: BackendClient,
        registry: Option<Arc<ServiceRegistry>>,
    ) -> Self {
        let mut router = Self::new(client)
            .with_breakers(config.breaker_set())
            .with_call_timeout(config.call_timeout());
        router.registry = registry;
        for (name, url) in config.addresses() {
            router.register_backend(name, url);
        }
        router
    }

    /// Register a remote backend
    pub fn with_backend(mut self, name: impl Into<String>, url: Url) -> Self {
        self.register_backend(name.into(), url);
        self
    }

    /// Use `registry` for names with no remote address
    pub fn with_registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_breakers(mut self, breakers: BreakerSet) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn register_backend(&mut self, name: String, url: Url) {
        info!(backend = %name, url = %url, "Registering backend with gateway");
        self.addresses.insert(name, url);
    }

    /// Remote address registered under `name`
    pub fn address(&self, name: &str) -> Option<&Url> {
        self.addresses.get(name)
    }

    pub fn registry(&self) -> Option<&Arc<ServiceRegistry>> {
        self.registry.as_ref()
    }

    pub fn breakers(&self) -> &BreakerSet {
        &self.breakers
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Every name the router can dispatch to, sorted and unique
    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.addresses.keys().cloned().collect();
        if let Some(registry) = &self.registry {
            names.extend(registry.service_names());
        }
        names.sort();
        names.dedup();
        names
    }

    /// Breaker state of every backend that has been called
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    /// Dispatch a wire-level tool call request
    pub async fn dispatch_request(&self, request: &ToolCallRequest) -> GatewayResult<ToolCallResult> {
        self.dispatch(&request.backend_name, &request.tool_name, &request.arguments)
            .await
    }

    /// Send `tool_name` with `arguments` to `backend`.
    ///
    /// Non-2xx backend responses come back as an unsuccessful
    /// [`ToolCallResult`] carrying the backend's status and body; they do not
    /// count against the breaker. Transport failures and timeouts do.
    pub async fn dispatch(
        &self,
        backend: &str,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> GatewayResult<ToolCallResult> {
        let target = self.resolve(backend)?;
        let payload = ToolCallPayload {
            tool_name: tool_name.to_string(),
            arguments: arguments.clone(),
        };

        debug!(backend, tool = tool_name, "Dispatching tool call");
        let result = match target {
            Target::Remote(url) => {
                let response = self.send_remote(backend, url, &payload).await?;
                into_result(backend, response)
            }
            Target::Local(registry) => self.call_local(backend, registry, &payload).await,
        };

        if let Err(e) = &result {
            if e.is_transport_failure() {
                warn!(backend, tool = tool_name, error = %e, "Tool call failed");
            }
        }
        result
    }

    fn resolve(&self, backend: &str) -> GatewayResult<Target<'_>> {
        if let Some(url) = self.addresses.get(backend) {
            return Ok(Target::Remote(url));
        }
        match &self.registry {
            Some(registry) if registry.contains(backend) => Ok(Target::Local(registry)),
            _ => Err(GatewayError::UnknownBackend(backend.to_string())),
        }
    }

    async fn send_remote(
        &self,
        backend: &str,
        url: &Url,
        payload: &ToolCallPayload,
    ) -> GatewayResult<BackendResponse> {
        let breaker = self.breakers.get(backend);
        breaker
            .call(move || async move {
                match tokio::time::timeout(self.call_timeout, self.client.call_tool(url, payload))
                    .await
                {
                    Ok(response) => response.map_err(|e| e.into_gateway_error(backend)),
                    Err(_) => Err(GatewayError::timeout(backend)),
                }
            })
            .await
    }

    /// Construction of the service counts toward the call timeout.
    async fn call_local(
        &self,
        backend: &str,
        registry: &ServiceRegistry,
        payload: &ToolCallPayload,
    ) -> GatewayResult<ToolCallResult> {
        let breaker = self.breakers.get(backend);
        breaker
            .call(move || async move {
                let call = async {
                    let service = registry.get_or_create(backend).await?;
                    service
                        .call_tool(&payload.tool_name, &payload.arguments)
                        .await
                };
                match tokio::time::timeout(self.call_timeout, call).await {
                    Ok(value) => value.map(ToolCallResult::ok),
                    Err(_) => Err(GatewayError::timeout(backend)),
                }
            })
            .await
    }
}

/// Turn a raw backend response into a tool call result.
///
/// A 2xx body must be JSON; an empty 2xx body becomes `null`. Non-2xx
/// responses keep whatever body the backend sent; a non-JSON one is also
/// kept undecoded, with its content type, so it can be relayed unchanged.
pub fn into_result(backend: &str, response: BackendResponse) -> GatewayResult<ToolCallResult> {
    if !response.is_success() {
        debug!(backend, status = response.status, "Backend returned non-success status");
        return Ok(match response.body {
            ResponseBody::Json(payload) => {
                ToolCallResult::backend_status(backend, response.status, payload)
            }
            ResponseBody::Text(text) => {
                ToolCallResult::backend_status(backend, response.status, Value::String(text.clone()))
                    .with_raw_body(response.content_type, text)
            }
        });
    }

    match response.body {
        ResponseBody::Json(payload) => Ok(ToolCallResult::with_status(response.status, payload)),
        ResponseBody::Text(text) if text.trim().is_empty() => {
            Ok(ToolCallResult::with_status(response.status, Value::Null))
        }
        ResponseBody::Text(_) => Err(GatewayError::BackendProtocol {
            backend: backend.to_string(),
            message: "response body is not valid JSON".to_string(),
        }),
    }
}
