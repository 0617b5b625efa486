//! Reservation ledger: the coordinator's durable record of what it asked
//! the inventory store to hold.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};
use thiserror::Error;

use crate::reservation::{ReservationEntry, ReservationState};

pub use memory::InMemoryReservationLedger;
pub use postgres::PgReservationLedger;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An entry already exists under this token.
    #[error("Reservation already recorded for token {0}")]
    DuplicateToken(IdempotencyToken),

    /// No entry exists under this token.
    #[error("Unknown reservation token {0}")]
    UnknownToken(IdempotencyToken),

    /// The requested transition is not allowed from the entry's state.
    #[error("Invalid reservation transition for {token}: {from} -> {to}")]
    InvalidTransition {
        token: IdempotencyToken,
        from: ReservationState,
        to: ReservationState,
    },

    /// A stored state column did not parse. Indicates external writes to
    /// the ledger table.
    #[error("Unrecognized reservation state in storage: {0}")]
    CorruptState(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Durable journal of reservations, one entry per idempotency token.
///
/// The coordinator records an entry before delivering the reduce and moves
/// it through [`ReservationState`] as outcomes arrive. Implementations must
/// reject transitions the state machine forbids, so a replayed or reordered
/// call cannot rewrite history. `entries_for_attempt` returns entries in
/// the order they were begun; compensation walks that list in reverse.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Records a pending reservation for one line item, deriving its token.
    ///
    /// Fails with [`LedgerError::DuplicateToken`] if the token was already
    /// begun, which means the same line of the same attempt was processed
    /// twice.
    async fn begin(
        &self,
        order_attempt_id: OrderAttemptId,
        product_id: ProductId,
        variant_key: VariantKey,
        quantity: u32,
    ) -> Result<ReservationEntry>;

    /// Marks a pending reservation as committed by the inventory store.
    async fn mark_committed(&self, token: &IdempotencyToken) -> Result<()>;

    /// Marks a pending reservation as failed; there is nothing to restore.
    async fn mark_failed(&self, token: &IdempotencyToken) -> Result<()>;

    /// Marks a committed reservation as compensated after a confirmed
    /// restore.
    async fn mark_compensated(&self, token: &IdempotencyToken) -> Result<()>;

    /// Returns all entries for an attempt in the order they were begun.
    async fn entries_for_attempt(
        &self,
        order_attempt_id: OrderAttemptId,
    ) -> Result<Vec<ReservationEntry>>;

    /// Returns the entry recorded under a token, if any.
    async fn entry(&self, token: &IdempotencyToken) -> Result<Option<ReservationEntry>>;
}
