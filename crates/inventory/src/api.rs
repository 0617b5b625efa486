use async_trait::async_trait;

use crate::{
    CheckRequest, CheckStatus, ReduceRequest, ReduceStatus, Result, RestoreRequest, RestoreStatus,
};

/// Operations exposed by the inventory store.
///
/// Implementations must keep three guarantees:
/// - `reduce_inventory` performs a single atomic conditional decrement, so
///   two concurrent reduces on the same record are linearized and at most
///   one commits when only enough stock for one remains;
/// - a token already committed by `reduce_inventory` answers
///   `AlreadyApplied` on replay, with no further mutation;
/// - `restore_inventory` increments stock exactly once per token, answers
///   `AlreadyApplied` on replay, and `NotFound` for a token that never
///   committed.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Reports whether the requested quantity is currently available.
    /// Read-only and advisory; never reserves anything.
    async fn check_availability(&self, request: CheckRequest) -> Result<CheckStatus>;

    /// Decrements available stock if, and only if, enough is left.
    async fn reduce_inventory(&self, request: ReduceRequest) -> Result<ReduceStatus>;

    /// Returns stock previously taken by the reduce with the same token.
    async fn restore_inventory(&self, request: RestoreRequest) -> Result<RestoreStatus>;
}
