//! Service descriptor models

use serde::{Deserialize, Serialize};

/// Registration record for an in-process service
///
/// `factory` names a constructor registered with the
/// [`ServiceRegistry`](crate::registry::ServiceRegistry); construction is
/// deferred until the service is first requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique service name
    pub name: String,
    /// Key of the factory that builds this service
    pub factory: String,
    /// Whether at most one instance may exist
    #[serde(default = "default_singleton")]
    pub singleton: bool,
    /// Services that must be constructed first and are handed to the factory
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_singleton() -> bool {
    true
}

impl ServiceDescriptor {
    /// Singleton descriptor whose factory key equals its name
    pub fn singleton(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            factory: name.clone(),
            name,
            singleton: true,
            dependencies: Vec::new(),
        }
    }

    /// Descriptor that builds a fresh instance on every request
    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            singleton: false,
            ..Self::singleton(name)
        }
    }

    pub fn with_factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = factory.into();
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }
}
