//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartId, ProductId, VariantKey};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::services::CollaboratorError;

/// One line of a cart: a product variant and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_key: VariantKey,
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price: Money,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(
        product_id: impl Into<String>,
        variant_key: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            variant_key: VariantKey::new(variant_key),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A cart as the cart service last saw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart_id: CartId,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Creates a snapshot from lines.
    pub fn new(cart_id: CartId, lines: Vec<CartLine>) -> Self {
        Self { cart_id, lines }
    }

    /// Returns the total across all lines.
    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.total_price())
    }
}

/// Trait for reading carts at checkout time.
#[async_trait]
pub trait CartProvider: Send + Sync {
    /// Returns the cart's current contents, or `None` if no such cart.
    async fn get_cart(&self, cart_id: CartId) -> Result<Option<CartSnapshot>, CollaboratorError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<CartId, CartSnapshot>,
    fail_on_get: bool,
}

/// In-memory cart provider for testing and the default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartProvider {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartProvider {
    /// Creates a new in-memory cart provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a cart, replacing any existing contents.
    pub fn put_cart(&self, snapshot: CartSnapshot) {
        self.state
            .write()
            .unwrap()
            .carts
            .insert(snapshot.cart_id, snapshot);
    }

    /// Configures the provider to fail on get calls.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get = fail;
    }

    /// Returns the number of stored carts.
    pub fn cart_count(&self) -> usize {
        self.state.read().unwrap().carts.len()
    }
}

#[async_trait]
impl CartProvider for InMemoryCartProvider {
    async fn get_cart(&self, cart_id: CartId) -> Result<Option<CartSnapshot>, CollaboratorError> {
        let state = self.state.read().unwrap();

        if state.fail_on_get {
            return Err(CollaboratorError::Cart("cart store unreachable".to_string()));
        }

        Ok(state.carts.get(&cart_id).cloned())
    }
}
