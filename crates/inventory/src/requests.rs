use common::{IdempotencyToken, ProductId, VariantKey};
use serde::{Deserialize, Serialize};

/// Read-only availability probe. Advisory: a check followed later by a
/// reduce can race, so callers must never treat `Available` as a
/// reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub product_id: ProductId,
    pub variant_key: VariantKey,
    pub quantity: u32,
}

/// Atomic conditional decrement of available stock, keyed by an
/// idempotency token so duplicate delivery never double-decrements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceRequest {
    pub token: IdempotencyToken,
    pub product_id: ProductId,
    pub variant_key: VariantKey,
    pub quantity: u32,
}

/// Exactly-once inverse of a committed reduce, keyed by the same token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub token: IdempotencyToken,
    pub product_id: ProductId,
    pub variant_key: VariantKey,
    pub quantity: u32,
}

/// Outcome of a [`CheckRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Available,
    Insufficient,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Available => "Available",
            CheckStatus::Insufficient => "Insufficient",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a [`ReduceRequest`].
///
/// `AlreadyApplied` means the token was committed by an earlier delivery;
/// the replayed call changed nothing and the original decrement stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceStatus {
    Committed,
    InsufficientStock,
    AlreadyApplied,
}

impl ReduceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReduceStatus::Committed => "Committed",
            ReduceStatus::InsufficientStock => "InsufficientStock",
            ReduceStatus::AlreadyApplied => "AlreadyApplied",
        }
    }
}

impl std::fmt::Display for ReduceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a [`RestoreRequest`].
///
/// `NotFound` means the token was never committed by a reduce; restoring it
/// would invent stock, so the call is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreStatus {
    Committed,
    AlreadyApplied,
    NotFound,
}

impl RestoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreStatus::Committed => "Committed",
            RestoreStatus::AlreadyApplied => "AlreadyApplied",
            RestoreStatus::NotFound => "NotFound",
        }
    }
}

impl std::fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
