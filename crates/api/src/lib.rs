//! HTTP API server with observability for the order placement system.
//!
//! Exposes the inventory RPC surface and the checkout flow over REST,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    InMemoryCartProvider, InMemoryOrderStore, InMemoryPaymentProvider, InMemoryReservationLedger,
    OrderCoordinator,
};
use inventory::InMemoryInventoryStore;
use inventory_client::InventoryClient;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::checkout::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/inventory/check-availability",
            post(routes::inventory::check),
        )
        .route(
            "/inventory/reduce-inventory",
            post(routes::inventory::reduce),
        )
        .route(
            "/inventory/restore-inventory",
            post(routes::inventory::restore),
        )
        .route("/inventory/stock", put(routes::inventory::set_stock))
        .route(
            "/inventory/stock/{product_id}/{variant_key}",
            get(routes::inventory::get_stock),
        )
        .route("/carts", post(routes::checkout::create_cart))
        .route("/checkout", post(routes::checkout::place_order))
        .route(
            "/checkout/attempts/{attempt_id}/reservations",
            get(routes::checkout::reservations),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: the in-memory store behind one
/// guarded client, the in-memory ledger, and in-memory collaborators.
///
/// The client (and so the circuit breaker) is built once here and shared
/// for the life of the process.
pub fn create_default_state(config: &Config) -> Arc<AppState> {
    let store = InMemoryInventoryStore::new();
    let client = InventoryClient::with_config(Arc::new(store.clone()), config.client_config());
    let ledger = InMemoryReservationLedger::new();
    let carts = InMemoryCartProvider::new();
    let payments = InMemoryPaymentProvider::new();
    let orders = InMemoryOrderStore::new();

    let coordinator = OrderCoordinator::new(
        client.clone(),
        ledger,
        carts.clone(),
        payments,
        orders,
    );

    Arc::new(AppState {
        store,
        client,
        carts,
        coordinator,
    })
}
