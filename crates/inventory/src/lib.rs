//! Inventory Store: per-(product, variant) stock counters with atomic,
//! idempotent check/reduce/restore operations.
//!
//! The store is the single owner of [`StockRecord`] state. All mutation goes
//! through [`InventoryApi::reduce_inventory`] and
//! [`InventoryApi::restore_inventory`], both keyed by an idempotency token so
//! that a retried or replayed call applies its effect at most once. Reduce is
//! the sole allocation decision point: it performs one atomic conditional
//! decrement, so concurrent callers are linearized and stock never goes
//! negative.
//!
//! Two implementations are provided: [`InMemoryInventoryStore`] (a single
//! write lock over the state map) and [`PgInventoryStore`] (row locking under
//! a transaction).

pub mod api;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod requests;
pub mod stock;

pub use api::InventoryApi;
pub use error::{InventoryError, Result};
pub use memory::InMemoryInventoryStore;
pub use postgres::PgInventoryStore;
pub use requests::{
    CheckRequest, CheckStatus, ReduceRequest, ReduceStatus, RestoreRequest, RestoreStatus,
};
pub use stock::{StockKey, StockRecord};
