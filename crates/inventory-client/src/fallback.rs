use inventory::{CheckRequest, ReduceRequest, RestoreRequest};

use crate::{CheckOutcome, ReduceOutcome, RestoreOutcome};

/// Supplies the outcome when the store cannot be called: breaker open,
/// call timed out, or retries exhausted.
///
/// A policy must never claim success. A fallback that answers nothing, or
/// answers something a caller can mistake for "committed", turns an outage
/// into oversold stock or silently lost compensation.
pub trait FallbackPolicy: Send + Sync {
    fn check_fallback(&self, request: &CheckRequest) -> CheckOutcome;
    fn reduce_fallback(&self, request: &ReduceRequest) -> ReduceOutcome;
    fn restore_fallback(&self, request: &RestoreRequest) -> RestoreOutcome;
}

/// The default policy: assume no stock when uncertain.
///
/// Check degrades to `Insufficient`, reduce and restore to `Unavailable`.
/// All three are distinguishable from every real store answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeFallback;

impl FallbackPolicy for ConservativeFallback {
    fn check_fallback(&self, request: &CheckRequest) -> CheckOutcome {
        tracing::warn!(
            product_id = %request.product_id,
            variant_key = %request.variant_key,
            "check degraded, assuming insufficient stock"
        );
        CheckOutcome::Insufficient
    }

    fn reduce_fallback(&self, request: &ReduceRequest) -> ReduceOutcome {
        tracing::warn!(
            token = %request.token,
            "reduce degraded, reporting unavailable"
        );
        ReduceOutcome::Unavailable
    }

    fn restore_fallback(&self, request: &RestoreRequest) -> RestoreOutcome {
        tracing::warn!(
            token = %request.token,
            "restore degraded, compensation unconfirmed"
        );
        RestoreOutcome::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};

    use super::*;

    #[test]
    fn conservative_policy_never_claims_success() {
        let policy = ConservativeFallback;
        let product = ProductId::new("P1");
        let variant = VariantKey::new("M");
        let token = IdempotencyToken::derive(OrderAttemptId::new(), &product, &variant);

        let check = policy.check_fallback(&CheckRequest {
            product_id: product.clone(),
            variant_key: variant.clone(),
            quantity: 1,
        });
        assert_eq!(check, CheckOutcome::Insufficient);

        let reduce = policy.reduce_fallback(&ReduceRequest {
            token: token.clone(),
            product_id: product.clone(),
            variant_key: variant.clone(),
            quantity: 1,
        });
        assert_eq!(reduce, ReduceOutcome::Unavailable);
        assert!(!reduce.is_committed());

        let restore = policy.restore_fallback(&RestoreRequest {
            token,
            product_id: product,
            variant_key: variant,
            quantity: 1,
        });
        assert_eq!(restore, RestoreOutcome::Unavailable);
        assert!(!restore.is_restored());
    }
}
