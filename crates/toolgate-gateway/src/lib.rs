//! toolgate-gateway - Tool-call routing and fan-out aggregation
//!
//! This crate turns a [`GatewayConfig`] into a [`GatewayRouter`] that
//! dispatches tool calls to remote backends or in-process services, and a
//! [`ResultAggregator`] that fans one query out to many of them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        toolgate gateway                          │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                   ResultAggregator                        │   │
//! │  │  - Queries every target concurrently                      │   │
//! │  │  - Keeps partial results, dedups rows                     │   │
//! │  └───────────────────────────┬──────────────────────────────┘   │
//! │                              │                                   │
//! │  ┌───────────────────────────▼──────────────────────────────┐   │
//! │  │                     GatewayRouter                         │   │
//! │  │  - Resolves name -> address or registry service           │   │
//! │  │  - One CircuitBreaker per backend                         │   │
//! │  └───────────────┬──────────────────────────┬───────────────┘   │
//! │                  │                          │                    │
//! │                  ▼                          ▼                    │
//! │  ┌───────────────────────┐   ┌─────────────────────────────┐    │
//! │  │  BackendClient (HTTP) │   │  ServiceRegistry            │    │
//! │  │  POST {url}/tool-call │   │  cache / memory / etl       │    │
//! │  └───────────────────────┘   └─────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use toolgate_gateway::{GatewayConfig, GatewayRouter, ResultAggregator};
//!
//! let config = GatewayConfig::load(Path::new("toolgate.toml"))?;
//! let client = BackendClient::with_config(config.call_timeout(), config.connect_timeout())?;
//! let router = Arc::new(GatewayRouter::from_config(&config, client, None));
//!
//! let result = router.dispatch("search", "lookup", &arguments).await?;
//!
//! let aggregator = ResultAggregator::new(router.clone());
//! let merged = aggregator.fan_out(&query, &["a".into(), "b".into()]).await?;
//! ```

pub mod aggregator;
pub mod config;
mod router;

pub use aggregator::{content_key, extract_rows, ResultAggregator, RowSource, ROW_KEYS};
pub use config::{
    BackendConfig, BreakerSettings, ClientConfig, GatewayConfig, ServerConfig, ServicesConfig,
};
pub use router::{into_result, GatewayRouter};

// Re-export core types for convenience
pub use toolgate_core::{FanOutQuery, FanOutResult, GatewayError, GatewayResult, ToolCallResult};
