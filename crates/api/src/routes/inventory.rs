//! Inventory RPC and stock administration endpoints.
//!
//! The three RPC routes go through the guarded client, so a degraded store
//! answers conservatively (`Insufficient`/`Unavailable`) instead of
//! erroring; the wire status names the degraded leg explicitly.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ProductId, VariantKey};
use inventory::{CheckRequest, ReduceRequest, RestoreRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::checkout::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct SetStockRequest {
    pub product_id: String,
    pub variant_key: String,
    pub available: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub variant_key: String,
    pub available: u32,
    pub reserved: u32,
    pub version: u64,
}

// -- Handlers --

/// POST /inventory/check-availability — advisory availability probe.
#[tracing::instrument(skip(state, req))]
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Json<StatusResponse> {
    let outcome = state.client.check(req).await;
    Json(StatusResponse {
        status: outcome.to_string(),
    })
}

/// POST /inventory/reduce-inventory — idempotent conditional decrement.
#[tracing::instrument(skip(state, req))]
pub async fn reduce(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReduceRequest>,
) -> Json<StatusResponse> {
    let outcome = state.client.reduce(req).await;
    Json(StatusResponse {
        status: outcome.to_string(),
    })
}

/// POST /inventory/restore-inventory — exactly-once inverse of a reduce.
#[tracing::instrument(skip(state, req))]
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RestoreRequest>,
) -> Json<StatusResponse> {
    let outcome = state.client.restore(req).await;
    Json(StatusResponse {
        status: outcome.to_string(),
    })
}

/// PUT /inventory/stock — create or restock a position, keeping any
/// reserved quantity.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(req.product_id.as_str());
    let variant_key = VariantKey::new(req.variant_key.as_str());

    state
        .store
        .set_stock(product_id.clone(), variant_key.clone(), req.available)
        .await;

    let record = state
        .store
        .stock(&product_id, &variant_key)
        .await
        .ok_or_else(|| ApiError::Internal("stock position missing after upsert".to_string()))?;

    Ok(Json(StockResponse {
        product_id: req.product_id,
        variant_key: req.variant_key,
        available: record.available,
        reserved: record.reserved,
        version: record.version,
    }))
}

/// GET /inventory/stock/:product_id/:variant_key — read one position.
#[tracing::instrument(skip(state))]
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path((product_id, variant_key)): Path<(String, String)>,
) -> Result<Json<StockResponse>, ApiError> {
    let record = state
        .store
        .stock(
            &ProductId::new(product_id.as_str()),
            &VariantKey::new(variant_key.as_str()),
        )
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!("No stock position for {product_id}/{variant_key}"))
        })?;

    Ok(Json(StockResponse {
        product_id,
        variant_key,
        available: record.available,
        reserved: record.reserved,
        version: record.version,
    }))
}
