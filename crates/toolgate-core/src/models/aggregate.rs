//! Fan-out query and result models

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TargetFailure;

/// A logical query issued to several backends at once
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutQuery {
    /// Tool each backend is asked to run
    pub tool_name: String,
    /// Arguments shared by every target
    pub arguments: Map<String, Value>,
    /// Upper bound for the whole fan-out; targets still running are failed
    pub deadline: Option<Duration>,
}

impl FanOutQuery {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Merged output of a fan-out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOutResult {
    /// Deduplicated rows in target declaration order
    #[serde(rename = "results")]
    pub rows: Vec<Value>,
    /// Number of targets that answered
    pub succeeded: usize,
    /// Targets that failed, in declaration order
    pub failures: Vec<TargetFailure>,
}

impl FanOutResult {
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// True when at least one target failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
