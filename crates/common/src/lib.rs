//! Shared identifier types used across the checkout core.
//!
//! Every cross-crate identifier is a newtype so that order attempts, carts,
//! orders, products, and idempotency tokens cannot be mixed up at call
//! sites.

pub mod types;

pub use types::{CartId, IdempotencyToken, OrderAttemptId, OrderId, ProductId, VariantKey};
