//! Integration tests for the toolgate gateway
//!
//! The tests start stub backends and a real gateway on ephemeral ports and
//! talk to the gateway over HTTP, so no external services are needed:
//!
//! ```bash
//! cargo test -p toolgate-tests
//! ```
//!
//! # Test Structure
//!
//! - `gateway_e2e_test.rs` - tool-call forwarding, breakers, fan-out, health

// This crate only contains tests, no library code
