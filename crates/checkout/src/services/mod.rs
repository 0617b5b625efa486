//! Collaborator service traits and in-memory implementations.

pub mod cart;
pub mod orders;
pub mod payment;

use thiserror::Error;

pub use cart::{CartLine, CartProvider, CartSnapshot, InMemoryCartProvider};
pub use orders::{InMemoryOrderStore, OrderRecord, OrderStatus, OrderStore};
pub use payment::{ChargeOutcome, InMemoryPaymentProvider, PaymentProvider};

/// Errors from collaborator services the coordinator depends on.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Cart service error.
    #[error("Cart service error: {0}")]
    Cart(String),

    /// Payment service error.
    #[error("Payment service error: {0}")]
    Payment(String),

    /// Order service error.
    #[error("Order service error: {0}")]
    Orders(String),
}
