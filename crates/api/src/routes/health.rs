//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::routes::checkout::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Current state of the inventory store circuit: `Closed`, `Open`, or
    /// `HalfOpen`. The process stays healthy while degraded; this field
    /// tells operators which.
    pub inventory_breaker: String,
}

/// GET /health — returns system health status.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let breaker = state.client.breaker().state().await;
    Json(HealthResponse {
        status: "ok",
        inventory_breaker: format!("{breaker:?}"),
    })
}
