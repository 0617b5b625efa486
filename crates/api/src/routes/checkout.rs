//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{
    CancelFlag, CartLine, CartSnapshot, CheckoutOutcome, InMemoryCartProvider, InMemoryOrderStore,
    InMemoryPaymentProvider, InMemoryReservationLedger, Money, OrderCoordinator,
};
use common::{CartId, OrderAttemptId};
use inventory::InMemoryInventoryStore;
use inventory_client::InventoryClient;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// The coordinator over the default in-memory wiring.
pub type DefaultCoordinator = OrderCoordinator<
    InMemoryInventoryStore,
    InMemoryReservationLedger,
    InMemoryCartProvider,
    InMemoryPaymentProvider,
    InMemoryOrderStore,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: InMemoryInventoryStore,
    pub client: InventoryClient<InMemoryInventoryStore>,
    pub carts: InMemoryCartProvider,
    pub coordinator: DefaultCoordinator,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateCartRequest {
    pub lines: Vec<CartLineRequest>,
}

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub product_id: String,
    pub variant_key: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub cart_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartCreatedResponse {
    pub cart_id: String,
    pub line_count: usize,
}

#[derive(Serialize)]
pub struct ReservationEntryResponse {
    pub token: String,
    pub product_id: String,
    pub variant_key: String,
    pub quantity: u32,
    pub state: String,
    pub created_at: String,
    pub last_transition_at: String,
}

// -- Handlers --

/// POST /carts — store a cart snapshot for later checkout.
#[tracing::instrument(skip(state, req))]
pub async fn create_cart(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCartRequest>,
) -> (StatusCode, Json<CartCreatedResponse>) {
    let cart_id = CartId::new();
    let lines: Vec<CartLine> = req
        .lines
        .iter()
        .map(|line| {
            CartLine::new(
                line.product_id.as_str(),
                line.variant_key.as_str(),
                line.quantity,
                Money::from_cents(line.unit_price_cents),
            )
        })
        .collect();
    let line_count = lines.len();

    state.carts.put_cart(CartSnapshot::new(cart_id, lines));

    (
        StatusCode::CREATED,
        Json(CartCreatedResponse {
            cart_id: cart_id.to_string(),
            line_count,
        }),
    )
}

/// POST /checkout — run one synchronous checkout attempt for a cart.
///
/// `201` with the Finalized outcome when payment captured, `409` with the
/// Aborted outcome (reason and any stuck tokens) otherwise. Validation
/// failures map to `400`/`404` before any stock moves.
#[tracing::instrument(skip(state, req))]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError> {
    let cart_id = parse_cart_id(&req.cart_id)?;

    let outcome = state
        .coordinator
        .place_order(cart_id, CancelFlag::new())
        .await?;

    let status = if outcome.is_finalized() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(outcome)))
}

/// GET /checkout/attempts/:attempt_id/reservations — ledger view of one
/// attempt, in begin order. Unknown attempts return an empty list.
#[tracing::instrument(skip(state))]
pub async fn reservations(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<Vec<ReservationEntryResponse>>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&attempt_id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid attempt_id: {e}")))?;

    let entries = state
        .coordinator
        .reservations(OrderAttemptId::from_uuid(uuid))
        .await?;

    let responses: Vec<ReservationEntryResponse> = entries
        .into_iter()
        .map(|entry| ReservationEntryResponse {
            token: entry.token.as_str().to_string(),
            product_id: entry.product_id.to_string(),
            variant_key: entry.variant_key.to_string(),
            quantity: entry.quantity,
            state: entry.state.to_string(),
            created_at: entry.created_at.to_rfc3339(),
            last_transition_at: entry.last_transition_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(responses))
}

fn parse_cart_id(id: &str) -> Result<CartId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid cart_id: {e}")))?;
    Ok(CartId::from_uuid(uuid))
}
