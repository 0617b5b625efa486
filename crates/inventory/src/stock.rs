use common::{ProductId, VariantKey};
use serde::{Deserialize, Serialize};

/// Identity of one sellable stock position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub variant_key: VariantKey,
}

impl StockKey {
    pub fn new(product_id: ProductId, variant_key: VariantKey) -> Self {
        Self {
            product_id,
            variant_key,
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.product_id, self.variant_key)
    }
}

/// Stock counters for one (product, variant).
///
/// `available` is what a reduce may still take; `u32` makes the
/// never-negative invariant unconditional. `reserved` is the net quantity
/// committed by reduce and not yet restored. `version` increments on every
/// successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub available: u32,
    pub reserved: u32,
    pub version: u64,
}

impl StockRecord {
    /// A freshly stocked record with nothing reserved.
    pub fn with_available(available: u32) -> Self {
        Self {
            available,
            reserved: 0,
            version: 1,
        }
    }

    pub fn can_satisfy(&self, quantity: u32) -> bool {
        self.available >= quantity
    }
}
