//! Error types for backend client operations

use thiserror::Error;
use toolgate_core::GatewayError;

/// Result type alias for backend client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to a backend
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Timeout
    #[error("Request timed out")]
    Timeout,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl ClientError {
    /// Classify a reqwest failure by what went wrong on the wire
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::ConnectionFailed(err.to_string())
        } else {
            ClientError::HttpError(err)
        }
    }

    /// Convert into the gateway taxonomy for a call against `backend`.
    ///
    /// Every variant except a bad URL is a transport failure and counts
    /// against the backend's breaker.
    pub fn into_gateway_error(self, backend: &str) -> GatewayError {
        match self {
            ClientError::Timeout => GatewayError::timeout(backend),
            ClientError::ConnectionFailed(msg) => GatewayError::connect(backend, msg),
            ClientError::HttpError(e) => GatewayError::connect(backend, e.to_string()),
            ClientError::IoError(e) => GatewayError::connect(backend, e.to_string()),
            ClientError::InvalidUrl(e) => {
                GatewayError::Config(format!("Invalid URL for server '{}': {}", backend, e))
            }
        }
    }
}
