//! Shared data models for the gateway

mod aggregate;
mod service;
mod tool;

pub use aggregate::*;
pub use service::*;
pub use tool::*;
