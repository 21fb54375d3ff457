//! HTTP request handlers for the toolgate API

pub mod fan_out;
pub mod health;
pub mod tool_call;
