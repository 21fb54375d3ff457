//! Health and breaker status handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use toolgate_core::BreakerSnapshot;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub discovered_servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BreakersResponse {
    pub items: Vec<BreakerSnapshot>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        discovered_servers: state.router().backend_names(),
    })
}

/// GET /breakers
/// Breaker state of every backend called so far
pub async fn breakers(State(state): State<AppState>) -> Json<BreakersResponse> {
    Json(BreakersResponse {
        items: state.router().breaker_snapshots(),
    })
}
