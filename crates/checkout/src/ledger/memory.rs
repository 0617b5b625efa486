use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};
use tokio::sync::RwLock;

use crate::ledger::{LedgerError, ReservationLedger, Result};
use crate::reservation::{ReservationEntry, ReservationState};

#[derive(Default)]
struct LedgerState {
    entries: HashMap<IdempotencyToken, ReservationEntry>,
    // Begin order per attempt; compensation replays it in reverse.
    begun: HashMap<OrderAttemptId, Vec<IdempotencyToken>>,
}

/// In-memory reservation ledger.
///
/// Authoritative implementation for tests and the default wiring; enforces
/// the same transition rules as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryReservationLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryReservationLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across all attempts.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    async fn mark(&self, token: &IdempotencyToken, to: ReservationState) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(token)
            .ok_or_else(|| LedgerError::UnknownToken(token.clone()))?;

        if !entry.state.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition {
                token: token.clone(),
                from: entry.state,
                to,
            });
        }

        entry.state = to;
        entry.last_transition_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ReservationLedger for InMemoryReservationLedger {
    async fn begin(
        &self,
        order_attempt_id: OrderAttemptId,
        product_id: ProductId,
        variant_key: VariantKey,
        quantity: u32,
    ) -> Result<ReservationEntry> {
        let entry = ReservationEntry::new(order_attempt_id, product_id, variant_key, quantity);

        let mut state = self.state.write().await;
        if state.entries.contains_key(&entry.token) {
            return Err(LedgerError::DuplicateToken(entry.token));
        }

        state.entries.insert(entry.token.clone(), entry.clone());
        state
            .begun
            .entry(order_attempt_id)
            .or_default()
            .push(entry.token.clone());

        Ok(entry)
    }

    async fn mark_committed(&self, token: &IdempotencyToken) -> Result<()> {
        self.mark(token, ReservationState::Committed).await
    }

    async fn mark_failed(&self, token: &IdempotencyToken) -> Result<()> {
        self.mark(token, ReservationState::Failed).await
    }

    async fn mark_compensated(&self, token: &IdempotencyToken) -> Result<()> {
        self.mark(token, ReservationState::Compensated).await
    }

    async fn entries_for_attempt(
        &self,
        order_attempt_id: OrderAttemptId,
    ) -> Result<Vec<ReservationEntry>> {
        let state = self.state.read().await;
        let tokens = match state.begun.get(&order_attempt_id) {
            Some(tokens) => tokens,
            None => return Ok(Vec::new()),
        };

        Ok(tokens
            .iter()
            .filter_map(|token| state.entries.get(token).cloned())
            .collect())
    }

    async fn entry(&self, token: &IdempotencyToken) -> Result<Option<ReservationEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn begin_line(
        ledger: &InMemoryReservationLedger,
        attempt: OrderAttemptId,
        product: &str,
        variant: &str,
        quantity: u32,
    ) -> ReservationEntry {
        ledger
            .begin(
                attempt,
                ProductId::new(product),
                VariantKey::new(variant),
                quantity,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn begin_records_a_pending_entry() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();

        let entry = begin_line(&ledger, attempt, "P1", "M", 2).await;

        assert_eq!(entry.state, ReservationState::Pending);
        let stored = ledger.entry(&entry.token).await.unwrap().unwrap();
        assert_eq!(stored, entry);
        assert_eq!(ledger.entry_count().await, 1);
    }

    #[tokio::test]
    async fn begin_rejects_duplicate_tokens() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();

        begin_line(&ledger, attempt, "P1", "M", 2).await;
        let result = ledger
            .begin(attempt, ProductId::new("P1"), VariantKey::new("M"), 2)
            .await;

        assert!(matches!(result, Err(LedgerError::DuplicateToken(_))));
        assert_eq!(ledger.entry_count().await, 1);
    }

    #[tokio::test]
    async fn commit_then_compensate_walks_the_lifecycle() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();
        let entry = begin_line(&ledger, attempt, "P1", "M", 2).await;

        ledger.mark_committed(&entry.token).await.unwrap();
        let committed = ledger.entry(&entry.token).await.unwrap().unwrap();
        assert_eq!(committed.state, ReservationState::Committed);
        assert!(committed.last_transition_at >= committed.created_at);

        ledger.mark_compensated(&entry.token).await.unwrap();
        let compensated = ledger.entry(&entry.token).await.unwrap().unwrap();
        assert_eq!(compensated.state, ReservationState::Compensated);
    }

    #[tokio::test]
    async fn failed_reservation_is_terminal() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();
        let entry = begin_line(&ledger, attempt, "P1", "M", 2).await;

        ledger.mark_failed(&entry.token).await.unwrap();

        let result = ledger.mark_committed(&entry.token).await;
        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransition {
                from: ReservationState::Failed,
                to: ReservationState::Committed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn compensating_a_pending_entry_is_rejected() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();
        let entry = begin_line(&ledger, attempt, "P1", "M", 2).await;

        let result = ledger.mark_compensated(&entry.token).await;

        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransition {
                from: ReservationState::Pending,
                to: ReservationState::Compensated,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn double_compensation_is_rejected() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();
        let entry = begin_line(&ledger, attempt, "P1", "M", 2).await;

        ledger.mark_committed(&entry.token).await.unwrap();
        ledger.mark_compensated(&entry.token).await.unwrap();

        let result = ledger.mark_compensated(&entry.token).await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn unknown_token_is_reported() {
        let ledger = InMemoryReservationLedger::new();
        let token = IdempotencyToken::new("nothing-here");

        let result = ledger.mark_committed(&token).await;
        assert!(matches!(result, Err(LedgerError::UnknownToken(_))));
        assert!(ledger.entry(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_for_attempt_preserves_begin_order() {
        let ledger = InMemoryReservationLedger::new();
        let attempt = OrderAttemptId::new();

        begin_line(&ledger, attempt, "P1", "M", 1).await;
        begin_line(&ledger, attempt, "P2", "L", 2).await;
        begin_line(&ledger, attempt, "P3", "S", 3).await;

        let entries = ledger.entries_for_attempt(attempt).await.unwrap();
        let products: Vec<&str> = entries.iter().map(|e| e.product_id.as_str()).collect();
        assert_eq!(products, vec!["P1", "P2", "P3"]);
    }

    #[tokio::test]
    async fn attempts_are_isolated_from_each_other() {
        let ledger = InMemoryReservationLedger::new();
        let first = OrderAttemptId::new();
        let second = OrderAttemptId::new();

        begin_line(&ledger, first, "P1", "M", 1).await;
        begin_line(&ledger, second, "P1", "M", 1).await;
        begin_line(&ledger, second, "P2", "L", 2).await;

        assert_eq!(ledger.entries_for_attempt(first).await.unwrap().len(), 1);
        assert_eq!(ledger.entries_for_attempt(second).await.unwrap().len(), 2);
        assert!(
            ledger
                .entries_for_attempt(OrderAttemptId::new())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
