//! Reservation lifecycle state machine and ledger entries.

use chrono::{DateTime, Utc};
use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};
use serde::{Deserialize, Serialize};

/// The state of one reservation in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Committed ──► Compensated
///           └──► Failed
/// ```
///
/// `Committed` is the rest state of a finalized order; it only moves on to
/// `Compensated` when the attempt aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationState {
    /// Recorded before the reduce was delivered; outcome unknown.
    #[default]
    Pending,

    /// The inventory store confirmed the reduce.
    Committed,

    /// The reduce was refused or never confirmed; nothing to give back.
    Failed,

    /// The committed stock was returned during compensation (terminal state).
    Compensated,
}

impl ReservationState {
    /// Returns true if the given transition is allowed.
    pub fn can_transition_to(&self, next: ReservationState) -> bool {
        matches!(
            (self, next),
            (ReservationState::Pending, ReservationState::Committed)
                | (ReservationState::Pending, ReservationState::Failed)
                | (ReservationState::Committed, ReservationState::Compensated)
        )
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationState::Failed | ReservationState::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Pending => "Pending",
            ReservationState::Committed => "Committed",
            ReservationState::Failed => "Failed",
            ReservationState::Compensated => "Compensated",
        }
    }

    /// Parses a state name produced by [`ReservationState::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ReservationState::Pending),
            "Committed" => Some(ReservationState::Committed),
            "Failed" => Some(ReservationState::Failed),
            "Compensated" => Some(ReservationState::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ledger entry: what a checkout attempt asked the inventory store to
/// hold for one line item.
///
/// The token is derived from the attempt and the line item, so the entry
/// doubles as the compensation work list: everything `Committed` under an
/// attempt must be restored before that attempt may abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    /// Idempotency token the reduce and any restore were delivered under.
    pub token: IdempotencyToken,
    /// The checkout attempt this reservation belongs to.
    pub order_attempt_id: OrderAttemptId,
    pub product_id: ProductId,
    pub variant_key: VariantKey,
    pub quantity: u32,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

impl ReservationEntry {
    /// Creates a pending entry for one line item, deriving its token.
    pub fn new(
        order_attempt_id: OrderAttemptId,
        product_id: ProductId,
        variant_key: VariantKey,
        quantity: u32,
    ) -> Self {
        let token = IdempotencyToken::derive(order_attempt_id, &product_id, &variant_key);
        let now = Utc::now();
        Self {
            token,
            order_attempt_id,
            product_id,
            variant_key,
            quantity,
            state: ReservationState::Pending,
            created_at: now,
            last_transition_at: now,
        }
    }
}
