//! Gateway configuration
//!
//! Loaded once at startup from a TOML file:
//!
//! ```toml
//! [server]
//! port = 18090
//!
//! [client]
//! call_timeout_ms = 30000
//!
//! [breaker]
//! failure_threshold = 5
//! recovery_timeout_secs = 60
//!
//! [backends.search]
//! url = "http://localhost:9001"
//! failure_threshold = 3
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toolgate_core::{BreakerConfig, BreakerSet, GatewayError, GatewayResult};
use url::Url;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    /// Breaker defaults for every backend
    #[serde(default)]
    pub breaker: BreakerSettings,
    /// Remote backends by name
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
    #[serde(default)]
    pub services: ServicesConfig,
}

/// Listen address of the gateway's own HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    18090
}

/// Outbound client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for one backend call, connection included
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Timeout for establishing a connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Breaker tuning as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    toolgate_core::breaker::DEFAULT_FAILURE_THRESHOLD
}

fn default_recovery_timeout_secs() -> u64 {
    toolgate_core::breaker::DEFAULT_RECOVERY_TIMEOUT.as_secs()
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        BreakerConfig {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_secs(settings.recovery_timeout_secs),
        }
    }
}

/// One remote backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; tool calls go to `{url}/tool-call`
    pub url: Url,
    /// Overrides `[breaker].failure_threshold` for this backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    /// Overrides `[breaker].recovery_timeout_secs` for this backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_timeout_secs: Option<u64>,
}

/// In-process service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Register the built-in `cache`, `memory`, and `etl` services
    #[serde(default = "default_builtin")]
    pub builtin: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            builtin: default_builtin(),
        }
    }
}

fn default_builtin() -> bool {
    true
}

impl GatewayConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> GatewayResult<Self> {
        let config: GatewayConfig = toml::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file
    pub fn load(path: &Path) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.client.call_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.client.connect_timeout_ms)
    }

    /// Breaker configuration that applies to `backend`
    pub fn breaker_for(&self, backend: &str) -> BreakerConfig {
        let mut config = BreakerConfig::from(&self.breaker);
        if let Some(b) = self.backends.get(backend) {
            if let Some(threshold) = b.failure_threshold {
                config.failure_threshold = threshold;
            }
            if let Some(secs) = b.recovery_timeout_secs {
                config.recovery_timeout = Duration::from_secs(secs);
            }
        }
        config
    }

    /// Breaker set with defaults and every per-backend override applied
    pub fn breaker_set(&self) -> BreakerSet {
        self.backends.keys().fold(
            BreakerSet::new(BreakerConfig::from(&self.breaker)),
            |set, name| set.with_override(name.clone(), self.breaker_for(name)),
        )
    }

    /// Backend name -> base URL
    pub fn addresses(&self) -> BTreeMap<String, Url> {
        self.backends
            .iter()
            .map(|(name, b)| (name.clone(), b.url.clone()))
            .collect()
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> GatewayResult<()> {
        if self.client.call_timeout_ms == 0 {
            return Err(GatewayError::Config(
                "client.call_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let call_timeout = self.call_timeout();
        let mut scopes: Vec<(String, BreakerConfig)> =
            vec![("[breaker]".to_string(), BreakerConfig::from(&self.breaker))];

        for (name, backend) in &self.backends {
            match backend.url.scheme() {
                "http" | "https" => {}
                other => {
                    return Err(GatewayError::Config(format!(
                        "Backend '{}' uses unsupported scheme '{}'",
                        name, other
                    )))
                }
            }
            scopes.push((format!("backend '{}'", name), self.breaker_for(name)));
        }

        for (scope, breaker) in scopes {
            if breaker.failure_threshold == 0 {
                return Err(GatewayError::Config(format!(
                    "{}: failure_threshold must be at least 1",
                    scope
                )));
            }
            if breaker.recovery_timeout.is_zero() {
                return Err(GatewayError::Config(format!(
                    "{}: recovery_timeout_secs must be greater than zero",
                    scope
                )));
            }
            if call_timeout > breaker.recovery_timeout {
                return Err(GatewayError::Config(format!(
                    "{}: call timeout ({:?}) exceeds recovery timeout ({:?})",
                    scope, call_timeout, breaker.recovery_timeout
                )));
            }
        }

        Ok(())
    }
}
