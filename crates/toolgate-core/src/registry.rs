//! ServiceRegistry - lazily constructed in-process services
//!
//! Services are described by a [`ServiceDescriptor`] and built on first use
//! by a factory registered under the descriptor's `factory` key. Singleton
//! services are constructed at most once: each name owns a
//! [`tokio::sync::OnceCell`] slot, so concurrent first requests wait for the
//! single construction instead of racing to build their own.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, Once, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::models::ServiceDescriptor;
use crate::service::ToolService;
use crate::services;

/// Builds a service from its already-constructed dependencies
pub type ServiceFactory =
    Arc<dyn Fn(&ServiceDeps) -> GatewayResult<Arc<dyn ToolService>> + Send + Sync>;

type Slot = Arc<OnceCell<Arc<dyn ToolService>>>;

/// Dependencies handed to a factory, keyed by service name
pub struct ServiceDeps {
    service: String,
    services: HashMap<String, Arc<dyn ToolService>>,
}

impl ServiceDeps {
    /// Look up a dependency declared in the descriptor
    pub fn get(&self, name: &str) -> GatewayResult<Arc<dyn ToolService>> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::ServiceInit {
                service: self.service.clone(),
                message: format!("dependency '{}' was not declared", name),
            })
    }
}

/// Registry of in-process services
pub struct ServiceRegistry {
    descriptors: RwLock<HashMap<String, ServiceDescriptor>>,
    factories: RwLock<HashMap<String, ServiceFactory>>,
    instances: Mutex<HashMap<String, Slot>>,
    builtins: Once,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            builtins: Once::new(),
        }
    }

    /// Register the built-in services (`cache`, `memory`, `etl`).
    ///
    /// Runs once. Concurrent callers block until registration finishes;
    /// later calls are no-ops.
    pub fn initialize(&self) {
        if self.builtins.state().done() {
            debug!("Service registry already initialized");
            return;
        }
        self.builtins.call_once(|| {
            services::register_builtins(self);
            info!(services = ?self.service_names(), "Service registry initialized");
        });
    }

    /// Store a descriptor, replacing any previous one with the same name.
    ///
    /// A singleton that was already constructed under this name stays in
    /// place; the new descriptor applies to names not yet constructed.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Option<ServiceDescriptor> {
        let name = descriptor.name.clone();
        let previous = self.descriptors.write().insert(name.clone(), descriptor);
        if previous.is_some() {
            info!(service = %name, "Replaced service descriptor");
        } else {
            info!(service = %name, "Registered service descriptor");
        }
        previous
    }

    /// Register a constructor under `key`
    pub fn register_factory<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ServiceDeps) -> GatewayResult<Arc<dyn ToolService>> + Send + Sync + 'static,
    {
        self.factories.write().insert(key.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.read().contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<ServiceDescriptor> {
        self.descriptors.read().get(name).cloned()
    }

    /// Registered service names, sorted
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a singleton instance has been built for `name`
    pub fn is_constructed(&self, name: &str) -> bool {
        self.instances
            .lock()
            .get(name)
            .is_some_and(|slot| slot.initialized())
    }

    /// Return the service registered under `name`, constructing it if needed.
    ///
    /// Dependencies are resolved first. The service's `initialize` hook runs
    /// exactly once per constructed instance.
    pub async fn get_or_create(&self, name: &str) -> GatewayResult<Arc<dyn ToolService>> {
        self.resolve(name.to_string(), Vec::new()).await
    }

    fn resolve(
        &self,
        name: String,
        mut chain: Vec<String>,
    ) -> BoxFuture<'_, GatewayResult<Arc<dyn ToolService>>> {
        async move {
            if chain.contains(&name) {
                chain.push(name);
                return Err(GatewayError::DependencyCycle(chain));
            }

            let descriptor = self
                .descriptor(&name)
                .ok_or_else(|| GatewayError::UnknownService(name.clone()))?;
            chain.push(name.clone());

            if !descriptor.singleton {
                return self.construct(&descriptor, chain).await;
            }

            let slot = self.slot(&name);
            let instance = slot
                .get_or_try_init(|| self.construct(&descriptor, chain))
                .await?;
            Ok(instance.clone())
        }
        .boxed()
    }

    fn slot(&self, name: &str) -> Slot {
        self.instances
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    async fn construct(
        &self,
        descriptor: &ServiceDescriptor,
        chain: Vec<String>,
    ) -> GatewayResult<Arc<dyn ToolService>> {
        let mut services = HashMap::new();
        for dependency in &descriptor.dependencies {
            let instance = self.resolve(dependency.clone(), chain.clone()).await?;
            services.insert(dependency.clone(), instance);
        }

        let factory = self
            .factories
            .read()
            .get(&descriptor.factory)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownFactory {
                service: descriptor.name.clone(),
                factory: descriptor.factory.clone(),
            })?;

        let deps = ServiceDeps {
            service: descriptor.name.clone(),
            services,
        };
        let service = factory(&deps)?;

        service.initialize().await.map_err(|e| match e {
            e @ GatewayError::ServiceInit { .. } => e,
            other => GatewayError::ServiceInit {
                service: descriptor.name.clone(),
                message: other.to_string(),
            },
        })?;

        info!(
            service = %descriptor.name,
            singleton = descriptor.singleton,
            "Constructed service"
        );
        Ok(service)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
