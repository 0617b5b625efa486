//! Order record service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartId, OrderId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::services::CollaboratorError;

/// Lifecycle status of a durable order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created during checkout; payment not yet decided.
    Created,
    /// Payment captured, order finalized.
    Confirmed,
    /// Checkout aborted or the buyer cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub cart_id: CartId,
    pub total: Money,
    pub status: OrderStatus,
}

/// Trait for creating and updating durable order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates an order record in `Created` status and returns its ID.
    async fn create_order(
        &self,
        cart_id: CartId,
        total: Money,
    ) -> Result<OrderId, CollaboratorError>;

    /// Updates the status of an existing order.
    async fn mark_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, OrderRecord>,
    fail_on_create: bool,
    fail_on_status: bool,
}

/// In-memory order store for testing and the default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail on create calls.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the store to fail on status updates.
    pub fn set_fail_on_status(&self, fail: bool) {
        self.state.write().unwrap().fail_on_status = fail;
    }

    /// Returns the record for an order, if any.
    pub fn order(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.state.read().unwrap().orders.get(&order_id).cloned()
    }

    /// Returns the number of order records.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(
        &self,
        cart_id: CartId,
        total: Money,
    ) -> Result<OrderId, CollaboratorError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(CollaboratorError::Orders(
                "order store unreachable".to_string(),
            ));
        }

        let order_id = OrderId::new();
        state.orders.insert(
            order_id,
            OrderRecord {
                order_id,
                cart_id,
                total,
                status: OrderStatus::Created,
            },
        );

        Ok(order_id)
    }

    async fn mark_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_status {
            return Err(CollaboratorError::Orders(
                "order store unreachable".to_string(),
            ));
        }

        let record = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| CollaboratorError::Orders(format!("no such order: {order_id}")))?;
        record.status = status;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_confirm_order() {
        let store = InMemoryOrderStore::new();
        let cart_id = CartId::new();

        let order_id = store
            .create_order(cart_id, Money::from_cents(4500))
            .await
            .unwrap();
        assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Created);

        store
            .mark_status(order_id, OrderStatus::Confirmed)
            .await
            .unwrap();
        let record = store.order(order_id).unwrap();
        assert_eq!(record.status, OrderStatus::Confirmed);
        assert_eq!(record.cart_id, cart_id);
        assert_eq!(record.total, Money::from_cents(4500));
    }

    #[tokio::test]
    async fn mark_status_on_unknown_order_fails() {
        let store = InMemoryOrderStore::new();

        let result = store.mark_status(OrderId::new(), OrderStatus::Cancelled).await;
        assert!(matches!(result, Err(CollaboratorError::Orders(_))));
    }

    #[tokio::test]
    async fn fail_toggles() {
        let store = InMemoryOrderStore::new();
        store.set_fail_on_create(true);
        let result = store.create_order(CartId::new(), Money::zero()).await;
        assert!(matches!(result, Err(CollaboratorError::Orders(_))));
        assert_eq!(store.order_count(), 0);

        store.set_fail_on_create(false);
        let order_id = store
            .create_order(CartId::new(), Money::zero())
            .await
            .unwrap();

        store.set_fail_on_status(true);
        let result = store.mark_status(order_id, OrderStatus::Cancelled).await;
        assert!(matches!(result, Err(CollaboratorError::Orders(_))));
        assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Created);
    }
}
