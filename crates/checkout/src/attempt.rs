//! Checkout attempt state machine.

use common::{CartId, OrderAttemptId, OrderId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::services::CartLine;

/// The phase of a checkout attempt in its lifecycle.
///
/// Phase transitions:
/// ```text
/// Started ──► Reserving ──► Reserved ──► PaymentPending ──► Finalized
///                 │                            │
///                 └─────► Compensating ◄───────┘
///                               │
///                               └─────► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutPhase {
    /// Cart validated, nothing reserved yet.
    #[default]
    Started,

    /// Line reservations are being delivered to the inventory store.
    Reserving,

    /// Every line committed; the order record is being created.
    Reserved,

    /// Awaiting the payment service's answer.
    PaymentPending,

    /// Payment captured and the order confirmed (terminal state).
    Finalized,

    /// Committed reservations are being restored after a failure.
    Compensating,

    /// The attempt ended without an order; stock was given back (terminal
    /// state).
    Aborted,
}

impl CheckoutPhase {
    /// Returns true if the given transition is allowed.
    pub fn can_transition_to(&self, next: CheckoutPhase) -> bool {
        use CheckoutPhase::*;

        matches!(
            (self, next),
            (Started, Reserving)
                | (Reserving, Reserved)
                | (Reserving, Compensating)
                | (Reserved, PaymentPending)
                | (Reserved, Compensating)
                | (PaymentPending, Finalized)
                | (PaymentPending, Compensating)
                | (Compensating, Aborted)
        )
    }

    /// Returns true if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutPhase::Finalized | CheckoutPhase::Aborted)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutPhase::Started => "Started",
            CheckoutPhase::Reserving => "Reserving",
            CheckoutPhase::Reserved => "Reserved",
            CheckoutPhase::PaymentPending => "PaymentPending",
            CheckoutPhase::Finalized => "Finalized",
            CheckoutPhase::Compensating => "Compensating",
            CheckoutPhase::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One in-flight checkout attempt.
///
/// Carries the validated cart contents and the phase the coordinator has
/// driven it to. A retry of a failed checkout is a fresh attempt with a
/// fresh ID, never a resumed one.
#[derive(Debug, Clone)]
pub struct OrderAttempt {
    pub attempt_id: OrderAttemptId,
    pub cart_id: CartId,
    /// Validated and merged lines; one reservation token each.
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub phase: CheckoutPhase,
    /// Set once the order record exists.
    pub order_id: Option<OrderId>,
}

impl OrderAttempt {
    /// Creates a new attempt in the `Started` phase.
    pub fn new(cart_id: CartId, lines: Vec<CartLine>, total: Money) -> Self {
        Self {
            attempt_id: OrderAttemptId::new(),
            cart_id,
            lines,
            total,
            phase: CheckoutPhase::Started,
            order_id: None,
        }
    }

    /// Moves the attempt to the next phase.
    pub fn advance(&mut self, next: CheckoutPhase) {
        tracing::debug!(
            attempt_id = %self.attempt_id,
            from = %self.phase,
            to = %next,
            "checkout phase transition"
        );
        self.phase = next;
    }
}
