//! Checkout error and outcome types.

use common::{CartId, IdempotencyToken, OrderAttemptId, OrderId, ProductId, VariantKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::services::CollaboratorError;

/// Errors that can occur during checkout.
///
/// Validation variants fire before anything is reserved. The infrastructure
/// variants mean the coordinator could not finish driving the protocol; by
/// the time one surfaces, compensation for anything already committed has
/// run.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No cart exists under this ID.
    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// The cart has no lines.
    #[error("Cart is empty: {0}")]
    EmptyCart(CartId),

    /// A line asks for a zero quantity.
    #[error("Invalid quantity for {product_id}/{variant_key}")]
    InvalidQuantity {
        product_id: ProductId,
        variant_key: VariantKey,
    },

    /// Reservation ledger error.
    #[error("Reservation ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Collaborator service error.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Why a checkout attempt aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AbortReason {
    /// The inventory store refused a line for lack of stock.
    OutOfStock {
        product_id: ProductId,
        variant_key: VariantKey,
    },

    /// The inventory store could not confirm a line; treated as no stock.
    InventoryUnavailable {
        product_id: ProductId,
        variant_key: VariantKey,
    },

    /// The payment service refused the charge.
    PaymentDeclined { reason: String },

    /// The payment service gave no definitive answer; treated as not paid.
    PaymentUnavailable { detail: String },

    /// The buyer cancelled while the attempt was in flight.
    Cancelled,
}

impl AbortReason {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AbortReason::OutOfStock { .. } => "out_of_stock",
            AbortReason::InventoryUnavailable { .. } => "inventory_unavailable",
            AbortReason::PaymentDeclined { .. } => "payment_declined",
            AbortReason::PaymentUnavailable { .. } => "payment_unavailable",
            AbortReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::OutOfStock { product_id, variant_key } => {
                write!(f, "out of stock: {product_id}/{variant_key}")
            }
            AbortReason::InventoryUnavailable { product_id, variant_key } => {
                write!(f, "inventory unavailable: {product_id}/{variant_key}")
            }
            AbortReason::PaymentDeclined { reason } => {
                write!(f, "payment declined: {reason}")
            }
            AbortReason::PaymentUnavailable { detail } => {
                write!(f, "payment unavailable: {detail}")
            }
            AbortReason::Cancelled => write!(f, "cancelled by buyer"),
        }
    }
}

/// How a checkout attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum CheckoutOutcome {
    /// Payment captured; the order stands.
    Finalized {
        attempt_id: OrderAttemptId,
        order_id: OrderId,
        payment_id: String,
    },

    /// The attempt ended without a sale.
    Aborted {
        attempt_id: OrderAttemptId,
        /// Present when the order record was created before the abort.
        order_id: Option<OrderId>,
        reason: AbortReason,
        /// Committed reservations whose restore could not be confirmed.
        /// Non-empty means operator attention is needed.
        stuck: Vec<IdempotencyToken>,
    },
}

impl CheckoutOutcome {
    /// Returns true if the attempt finalized.
    pub fn is_finalized(&self) -> bool {
        matches!(self, CheckoutOutcome::Finalized { .. })
    }

    /// The attempt this outcome belongs to.
    pub fn attempt_id(&self) -> OrderAttemptId {
        match self {
            CheckoutOutcome::Finalized { attempt_id, .. } => *attempt_id,
            CheckoutOutcome::Aborted { attempt_id, .. } => *attempt_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reason_labels_are_stable() {
        let reasons = [
            AbortReason::OutOfStock {
                product_id: ProductId::new("P1"),
                variant_key: VariantKey::new("M"),
            },
            AbortReason::InventoryUnavailable {
                product_id: ProductId::new("P1"),
                variant_key: VariantKey::new("M"),
            },
            AbortReason::PaymentDeclined { reason: "card expired".to_string() },
            AbortReason::PaymentUnavailable { detail: "timeout".to_string() },
            AbortReason::Cancelled,
        ];
        let labels: Vec<&str> = reasons.iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![
                "out_of_stock",
                "inventory_unavailable",
                "payment_declined",
                "payment_unavailable",
                "cancelled"
            ]
        );
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = CheckoutOutcome::Finalized {
            attempt_id: OrderAttemptId::new(),
            order_id: OrderId::new(),
            payment_id: "PAY-0001".to_string(),
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "Finalized");
        assert_eq!(json["payment_id"], "PAY-0001");
    }

    #[test]
    fn aborted_outcome_carries_reason_and_stuck_tokens() {
        let outcome = CheckoutOutcome::Aborted {
            attempt_id: OrderAttemptId::new(),
            order_id: None,
            reason: AbortReason::OutOfStock {
                product_id: ProductId::new("P2"),
                variant_key: VariantKey::new("L"),
            },
            stuck: vec![IdempotencyToken::new("a:P1:M")],
        };

        assert!(!outcome.is_finalized());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "Aborted");
        assert_eq!(json["reason"]["kind"], "OutOfStock");
        assert_eq!(json["stuck"][0], "a:P1:M");
    }
}
