use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{IdempotencyToken, ProductId, VariantKey};
use tokio::sync::RwLock;

use crate::{
    CheckRequest, CheckStatus, InventoryApi, ReduceRequest, ReduceStatus, Result, RestoreRequest,
    RestoreStatus, StockKey, StockRecord,
};

/// What a committed reduce recorded, to make replay and restore idempotent.
#[derive(Debug, Clone)]
struct JournalEntry {
    key: StockKey,
    quantity: u32,
    restored: bool,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<StockKey, StockRecord>,
    journal: HashMap<IdempotencyToken, JournalEntry>,
}

/// In-memory inventory store.
///
/// Authoritative implementation for tests and the default wiring; provides
/// the same interface as the PostgreSQL implementation. A single write lock
/// over the state map linearizes all mutations, which is what makes the
/// conditional decrement in `reduce_inventory` atomic.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or restocks a record, leaving any reserved quantity intact.
    pub async fn set_stock(&self, product_id: ProductId, variant_key: VariantKey, available: u32) {
        let mut state = self.state.write().await;
        let key = StockKey::new(product_id, variant_key);
        match state.records.get_mut(&key) {
            Some(record) => {
                record.available = available;
                record.version += 1;
            }
            None => {
                state.records.insert(key, StockRecord::with_available(available));
            }
        }
    }

    /// Returns the current counters for a stock position, if stocked.
    pub async fn stock(&self, product_id: &ProductId, variant_key: &VariantKey) -> Option<StockRecord> {
        let state = self.state.read().await;
        let key = StockKey::new(product_id.clone(), variant_key.clone());
        state.records.get(&key).copied()
    }

    /// Clears all records and the token journal.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.records.clear();
        state.journal.clear();
    }
}

#[async_trait]
impl InventoryApi for InMemoryInventoryStore {
    async fn check_availability(&self, request: CheckRequest) -> Result<CheckStatus> {
        let state = self.state.read().await;
        let key = StockKey::new(request.product_id, request.variant_key);
        // Unknown stock is no stock.
        let available = state.records.get(&key).map(|r| r.available).unwrap_or(0);

        if available >= request.quantity {
            Ok(CheckStatus::Available)
        } else {
            Ok(CheckStatus::Insufficient)
        }
    }

    async fn reduce_inventory(&self, request: ReduceRequest) -> Result<ReduceStatus> {
        let mut state = self.state.write().await;

        if state.journal.contains_key(&request.token) {
            // Duplicate delivery; the original decrement stands.
            return Ok(ReduceStatus::AlreadyApplied);
        }

        let key = StockKey::new(request.product_id, request.variant_key);
        let Some(record) = state.records.get_mut(&key) else {
            return Ok(ReduceStatus::InsufficientStock);
        };
        if record.available < request.quantity {
            return Ok(ReduceStatus::InsufficientStock);
        }

        record.available -= request.quantity;
        record.reserved += request.quantity;
        record.version += 1;

        // Journaled only on commit, so a refused reduce is restorable by
        // nobody and a committed one exactly once.
        state.journal.insert(
            request.token,
            JournalEntry {
                key,
                quantity: request.quantity,
                restored: false,
            },
        );

        Ok(ReduceStatus::Committed)
    }

    async fn restore_inventory(&self, request: RestoreRequest) -> Result<RestoreStatus> {
        let mut state = self.state.write().await;

        // The journal, not the request, is authoritative for what to put back.
        let Some(entry) = state.journal.get(&request.token).cloned() else {
            return Ok(RestoreStatus::NotFound);
        };
        if entry.restored {
            return Ok(RestoreStatus::AlreadyApplied);
        }

        if let Some(record) = state.records.get_mut(&entry.key) {
            record.available += entry.quantity;
            record.reserved = record.reserved.saturating_sub(entry.quantity);
            record.version += 1;
        }
        if let Some(journaled) = state.journal.get_mut(&request.token) {
            journaled.restored = true;
        }

        Ok(RestoreStatus::Committed)
    }
}
