//! Payment service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;

use crate::money::Money;
use crate::services::CollaboratorError;

/// What the payment service decided about a charge.
///
/// A decline is a definitive business answer, not an error; transport and
/// gateway failures surface as [`CollaboratorError`] instead, and the caller
/// must treat those as not-paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge was captured.
    Paid {
        /// The payment ID assigned by the payment service.
        payment_id: String,
    },
    /// The charge was refused.
    Declined { reason: String },
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Charges the buyer for an order.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<ChargeOutcome, CollaboratorError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (OrderId, Money)>,
    next_id: u32,
    decline_next: Option<String>,
    fail_on_charge: bool,
}

/// In-memory payment provider for testing and the default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProvider {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentProvider {
    /// Creates a new in-memory payment provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to decline the next charge.
    pub fn set_decline_next(&self, reason: impl Into<String>) {
        self.state.write().unwrap().decline_next = Some(reason.into());
    }

    /// Configures the provider to fail on charge calls.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Returns the number of captured payments.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns true if a payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(payment_id)
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<ChargeOutcome, CollaboratorError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_charge {
            return Err(CollaboratorError::Payment(
                "payment gateway unreachable".to_string(),
            ));
        }

        if let Some(reason) = state.decline_next.take() {
            return Ok(ChargeOutcome::Declined { reason });
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(payment_id.clone(), (order_id, amount));

        Ok(ChargeOutcome::Paid { payment_id })
    }
}
