//! toolgate-core - Core types for the toolgate dispatch gateway
//!
//! This crate holds the pieces every other crate builds on:
//!
//! - [`GatewayError`], the error taxonomy shared by router, aggregator, and API
//! - [`CircuitBreaker`] and [`BreakerSet`], per-backend fault isolation
//! - [`ServiceRegistry`], lazily constructed in-process backends
//! - [`ToolService`], the trait in-process backends implement
//! - tool-call and fan-out models

pub mod breaker;
pub mod error;
pub mod models;
pub mod registry;
pub mod service;
pub mod services;

pub use breaker::{
    BreakerConfig, BreakerSet, BreakerSnapshot, BreakerState, CircuitBreaker, FailureClassifier,
};
pub use error::{ErrorKind, GatewayError, GatewayResult, TargetFailure, UnavailableReason};
pub use models::*;
pub use registry::{ServiceDeps, ServiceFactory, ServiceRegistry};
pub use service::ToolService;
