//! Application state for the toolgate API

use std::sync::Arc;

use toolgate_gateway::{GatewayRouter, ResultAggregator};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    router: Arc<GatewayRouter>,
    aggregator: Arc<ResultAggregator<Arc<GatewayRouter>>>,
}

impl AppState {
    /// Create state around a router; the aggregator fans out through it
    pub fn new(router: Arc<GatewayRouter>) -> Self {
        Self {
            aggregator: Arc::new(ResultAggregator::new(router.clone())),
            router,
        }
    }

    pub fn router(&self) -> &GatewayRouter {
        &self.router
    }

    pub fn aggregator(&self) -> &ResultAggregator<Arc<GatewayRouter>> {
        &self.aggregator
    }
}
