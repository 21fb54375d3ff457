//! Common error types for the gateway core

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Why a backend could not be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The backend's circuit breaker is open and rejected the call
    BreakerOpen,
    /// Connecting to or talking to the backend failed
    Connect(String),
    /// The call did not complete within its timeout
    Timeout,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::BreakerOpen => write!(f, "circuit breaker open"),
            UnavailableReason::Connect(msg) => write!(f, "connection failed: {}", msg),
            UnavailableReason::Timeout => write!(f, "call timed out"),
        }
    }
}

/// A single target that failed during a fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    /// Backend the query was sent to
    pub backend: String,
    /// Machine-readable error kind
    pub kind: ErrorKind,
    /// Human-readable error message
    pub error: String,
}

impl TargetFailure {
    pub fn from_error(backend: &str, err: &GatewayError) -> Self {
        Self {
            backend: backend.to_string(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// Errors that can occur while dispatching to backends
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No address or in-process service is known under this name
    #[error("Server '{0}' not found in config.")]
    UnknownBackend(String),

    /// No service descriptor is registered under this name
    #[error("Service '{0}' is not registered")]
    UnknownService(String),

    /// A descriptor names a factory that was never registered
    #[error("Service '{service}' refers to unknown factory '{factory}'")]
    UnknownFactory { service: String, factory: String },

    /// Service dependencies form a cycle
    #[error("Dependency cycle while constructing services: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A service failed to construct or initialize
    #[error("Service '{service}' failed to initialize: {message}")]
    ServiceInit { service: String, message: String },

    /// Breaker open, connect failure, or timeout
    #[error("Gateway could not connect to server '{backend}'.")]
    BackendUnavailable {
        backend: String,
        reason: UnavailableReason,
    },

    /// Backend answered, but with a payload the gateway cannot use
    #[error("Server '{backend}' returned an invalid response: {message}")]
    BackendProtocol { backend: String, message: String },

    /// Backend answered with a non-success status
    #[error("Server '{backend}' responded with status {status}")]
    BackendStatus { backend: String, status: u16 },

    /// A fan-out target did not finish before the request deadline
    #[error("Server '{backend}' did not respond before the request deadline")]
    DeadlineExceeded { backend: String },

    /// Every fan-out target failed
    #[error("All {} fan-out targets failed", .failures.len())]
    AggregationFailed { failures: Vec<TargetFailure> },

    /// Invalid parameter or request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error classification, stable across versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownBackend,
    UnknownService,
    BackendUnavailable,
    BackendProtocol,
    BackendStatus,
    DeadlineExceeded,
    AggregationFailed,
    InvalidRequest,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnknownBackend => "unknown_backend",
            ErrorKind::UnknownService => "unknown_service",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendProtocol => "backend_protocol",
            ErrorKind::BackendStatus => "backend_status",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::AggregationFailed => "aggregation_failed",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

impl GatewayError {
    /// Shorthand for a connect failure against `backend`
    pub fn connect(backend: &str, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.to_string(),
            reason: UnavailableReason::Connect(message.into()),
        }
    }

    /// Shorthand for a timed out call against `backend`
    pub fn timeout(backend: &str) -> Self {
        Self::BackendUnavailable {
            backend: backend.to_string(),
            reason: UnavailableReason::Timeout,
        }
    }

    /// Default breaker failure classifier.
    ///
    /// Only transport-level failures count against a backend. Application
    /// errors, protocol errors, and caller mistakes leave breaker state alone.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::BackendUnavailable {
                reason: UnavailableReason::Connect(_) | UnavailableReason::Timeout,
                ..
            }
        )
    }

    /// Backend this error is about, if any
    pub fn backend(&self) -> Option<&str> {
        match self {
            GatewayError::UnknownBackend(name) => Some(name),
            GatewayError::UnknownService(name) => Some(name),
            GatewayError::BackendUnavailable { backend, .. }
            | GatewayError::BackendProtocol { backend, .. }
            | GatewayError::BackendStatus { backend, .. }
            | GatewayError::DeadlineExceeded { backend } => Some(backend),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::UnknownBackend(_) => ErrorKind::UnknownBackend,
            GatewayError::UnknownService(_) => ErrorKind::UnknownService,
            GatewayError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            GatewayError::BackendProtocol { .. } => ErrorKind::BackendProtocol,
            GatewayError::BackendStatus { .. } => ErrorKind::BackendStatus,
            GatewayError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            GatewayError::AggregationFailed { .. } => ErrorKind::AggregationFailed,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GatewayError::UnknownFactory { .. }
            | GatewayError::DependencyCycle(_)
            | GatewayError::ServiceInit { .. }
            | GatewayError::Config(_)
            | GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::UnknownBackend(_) => 404,
            GatewayError::UnknownService(_) => 404,
            GatewayError::BackendUnavailable { .. } => 502,
            GatewayError::BackendProtocol { .. } => 502,
            GatewayError::BackendStatus { status, .. } => *status,
            GatewayError::DeadlineExceeded { .. } => 504,
            GatewayError::AggregationFailed { .. } => 502,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::UnknownFactory { .. } => 500,
            GatewayError::DependencyCycle(_) => 500,
            GatewayError::ServiceInit { .. } => 500,
            GatewayError::Config(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }
}
