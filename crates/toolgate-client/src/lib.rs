//! toolgate-client - HTTP client for toolgate backends
//!
//! Provides the connection-pooled [`BackendClient`] the gateway uses for
//! every outbound tool call. A backend is any HTTP service that accepts
//! `POST {base_url}/tool-call` with a body of
//! `{"tool_name": ..., "arguments": {...}}`.
//!
//! # Example
//!
//! ```rust,no_run
//! use toolgate_client::BackendClient;
//! use toolgate_core::ToolCallPayload;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::new()?;
//! let base = url::Url::parse("http://localhost:9001")?;
//! let payload = ToolCallPayload {
//!     tool_name: "search".to_string(),
//!     arguments: Default::default(),
//! };
//! let response = client.call_tool(&base, &payload).await?;
//! println!("{} {:?}", response.status, response.body);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides [`testing::TestServer`], which serves an
//! axum router on an ephemeral port for integration tests.

mod client;
mod error;
pub mod testing;

pub use client::{
    endpoint, BackendClient, BackendResponse, ResponseBody, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_TIMEOUT, TOOL_CALL_PATH,
};
pub use error::{ClientError, Result};
