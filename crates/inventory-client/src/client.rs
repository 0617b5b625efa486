use std::sync::Arc;
use std::time::Duration;

use inventory::{
    CheckRequest, InventoryApi, InventoryError, ReduceRequest, RestoreRequest,
};

use crate::{
    BreakerError, CheckOutcome, CircuitBreaker, CircuitBreakerConfig, ConservativeFallback,
    FallbackPolicy, ReduceOutcome, RestoreOutcome, RetryPolicy,
};

/// Configuration for one inventory client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for a single delivery; a slow store counts as a failure.
    pub call_timeout: Duration,
    /// Retry schedule for reduce and restore. Checks are advisory and get
    /// no retries.
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Typed facade the coordinator uses to reach the inventory store.
///
/// Wraps every delivery with the per-call timeout and the shared circuit
/// breaker, retries reduce/restore under the same idempotency token, and
/// folds every failure into the fallback policy's outcome. Methods return
/// outcomes, not errors: by the time a value comes back, the degraded legs
/// are already explicit (`Insufficient`/`Unavailable`).
pub struct InventoryClient<A> {
    api: Arc<A>,
    breaker: CircuitBreaker,
    fallback: Arc<dyn FallbackPolicy>,
    config: ClientConfig,
}

impl<A> Clone for InventoryClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            breaker: self.breaker.clone(),
            fallback: Arc::clone(&self.fallback),
            config: self.config.clone(),
        }
    }
}

impl<A: InventoryApi> InventoryClient<A> {
    /// Creates a client with the default configuration and the
    /// conservative fallback policy.
    pub fn new(api: Arc<A>) -> Self {
        Self::with_config(api, ClientConfig::default())
    }

    /// Creates a client with an explicit configuration.
    pub fn with_config(api: Arc<A>, config: ClientConfig) -> Self {
        Self {
            api,
            breaker: CircuitBreaker::new(config.breaker.clone()),
            fallback: Arc::new(ConservativeFallback),
            config,
        }
    }

    /// Replaces the fallback policy.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackPolicy>) -> Self {
        self.fallback = fallback;
        self
    }

    /// The circuit breaker guarding this client.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Advisory availability probe. Not retried: a stale or degraded
    /// answer only affects UI hints, never an allocation.
    #[tracing::instrument(skip(self, request), fields(stock = %request.product_id))]
    pub async fn check(&self, request: CheckRequest) -> CheckOutcome {
        metrics::counter!("inventory_client_calls_total", "op" => "check").increment(1);

        let api = Arc::clone(&self.api);
        let call_request = request.clone();
        let result = self
            .guarded(move || async move { api.check_availability(call_request).await })
            .await;

        match result {
            Ok(status) => CheckOutcome::from(status),
            Err(err) => {
                self.log_degraded("check", &err);
                metrics::counter!("inventory_client_fallbacks_total", "op" => "check")
                    .increment(1);
                self.fallback.check_fallback(&request)
            }
        }
    }

    /// Delivers a reduce, retrying timeouts and transport failures with
    /// the same token. Falls back to `Unavailable` when the breaker is
    /// open or retries exhaust.
    #[tracing::instrument(skip(self, request), fields(token = %request.token))]
    pub async fn reduce(&self, request: ReduceRequest) -> ReduceOutcome {
        metrics::counter!("inventory_client_calls_total", "op" => "reduce").increment(1);

        let mut attempt = 1;
        loop {
            let api = Arc::clone(&self.api);
            let call_request = request.clone();
            let result = self
                .guarded(move || async move { api.reduce_inventory(call_request).await })
                .await;

            match result {
                Ok(status) => return ReduceOutcome::from(status),
                Err(BreakerError::Open) => break,
                Err(BreakerError::Inner(err)) => {
                    tracing::warn!(attempt, error = %err, "reduce delivery failed");
                    if self.config.retry.is_exhausted(attempt) {
                        break;
                    }
                    metrics::counter!("inventory_client_retries_total", "op" => "reduce")
                        .increment(1);
                    tokio::time::sleep(self.config.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }

        metrics::counter!("inventory_client_fallbacks_total", "op" => "reduce").increment(1);
        self.fallback.reduce_fallback(&request)
    }

    /// Delivers a restore, retrying with the same token. Falls back to
    /// `Unavailable`, which the caller must treat as unconfirmed
    /// compensation, never as success.
    #[tracing::instrument(skip(self, request), fields(token = %request.token))]
    pub async fn restore(&self, request: RestoreRequest) -> RestoreOutcome {
        metrics::counter!("inventory_client_calls_total", "op" => "restore").increment(1);

        let mut attempt = 1;
        loop {
            let api = Arc::clone(&self.api);
            let call_request = request.clone();
            let result = self
                .guarded(move || async move { api.restore_inventory(call_request).await })
                .await;

            match result {
                Ok(status) => return RestoreOutcome::from(status),
                Err(BreakerError::Open) => break,
                Err(BreakerError::Inner(err)) => {
                    tracing::warn!(attempt, error = %err, "restore delivery failed");
                    if self.config.retry.is_exhausted(attempt) {
                        break;
                    }
                    metrics::counter!("inventory_client_retries_total", "op" => "restore")
                        .increment(1);
                    tokio::time::sleep(self.config.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }

        metrics::counter!("inventory_client_fallbacks_total", "op" => "restore").increment(1);
        self.fallback.restore_fallback(&request)
    }

    async fn guarded<T, F, Fut>(&self, operation: F) -> Result<T, BreakerError<InventoryError>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = inventory::Result<T>>,
    {
        let timeout = self.config.call_timeout;
        self.breaker
            .call(|| async move {
                match tokio::time::timeout(timeout, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(InventoryError::Unreachable(format!(
                        "call timed out after {}ms",
                        timeout.as_millis()
                    ))),
                }
            })
            .await
    }

    fn log_degraded(&self, op: &str, err: &BreakerError<InventoryError>) {
        match err {
            BreakerError::Open => {
                tracing::warn!(op, "breaker open, using fallback outcome");
            }
            BreakerError::Inner(inner) => {
                tracing::warn!(op, error = %inner, "store call failed, using fallback outcome");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    use async_trait::async_trait;
    use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};
    use inventory::{CheckStatus, InMemoryInventoryStore, ReduceStatus, RestoreStatus};

    use super::*;
    use crate::BreakerState;

    /// Store wrapper that injects failures and latency ahead of the real
    /// in-memory store.
    struct FlakyStore {
        inner: InMemoryInventoryStore,
        fail_next: AtomicU32,
        delay_ms: AtomicU64,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryInventoryStore::new(),
                fail_next: AtomicU32::new(0),
                delay_ms: AtomicU64::new(0),
            }
        }

        fn fail_times(&self, n: u32) {
            self.fail_next.store(n, Ordering::SeqCst);
        }

        fn delay(&self, ms: u64) {
            self.delay_ms.store(ms, Ordering::SeqCst);
        }

        async fn gate(&self) -> inventory::Result<()> {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let remaining = self.fail_next.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next.store(remaining - 1, Ordering::SeqCst);
                return Err(InventoryError::Unreachable("injected failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl InventoryApi for FlakyStore {
        async fn check_availability(
            &self,
            request: CheckRequest,
        ) -> inventory::Result<CheckStatus> {
            self.gate().await?;
            self.inner.check_availability(request).await
        }

        async fn reduce_inventory(
            &self,
            request: ReduceRequest,
        ) -> inventory::Result<ReduceStatus> {
            self.gate().await?;
            self.inner.reduce_inventory(request).await
        }

        async fn restore_inventory(
            &self,
            request: RestoreRequest,
        ) -> inventory::Result<RestoreStatus> {
            self.gate().await?;
            self.inner.restore_inventory(request).await
        }
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            call_timeout: Duration::from_millis(100),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                open_cooldown: Duration::from_millis(30),
                success_threshold: 1,
            },
        }
    }

    async fn seeded(available: u32) -> Arc<FlakyStore> {
        let store = FlakyStore::new();
        store
            .inner
            .set_stock(ProductId::new("P1"), VariantKey::new("M"), available)
            .await;
        Arc::new(store)
    }

    fn line_token() -> IdempotencyToken {
        IdempotencyToken::derive(
            OrderAttemptId::new(),
            &ProductId::new("P1"),
            &VariantKey::new("M"),
        )
    }

    fn reduce_request(token: IdempotencyToken, quantity: u32) -> ReduceRequest {
        ReduceRequest {
            token,
            product_id: ProductId::new("P1"),
            variant_key: VariantKey::new("M"),
            quantity,
        }
    }

    fn restore_request(token: IdempotencyToken, quantity: u32) -> RestoreRequest {
        RestoreRequest {
            token,
            product_id: ProductId::new("P1"),
            variant_key: VariantKey::new("M"),
            quantity,
        }
    }

    fn check_request(quantity: u32) -> CheckRequest {
        CheckRequest {
            product_id: ProductId::new("P1"),
            variant_key: VariantKey::new("M"),
            quantity,
        }
    }

    #[tokio::test]
    async fn reduce_passes_through_to_the_store() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());

        let outcome = client.reduce(reduce_request(line_token(), 2)).await;

        assert_eq!(outcome, ReduceOutcome::Committed);
        let record = store
            .inner
            .stock(&ProductId::new("P1"), &VariantKey::new("M"))
            .await
            .unwrap();
        assert_eq!(record.available, 3);
    }

    #[tokio::test]
    async fn reduce_retries_transient_failures_with_same_token() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());
        store.fail_times(2);

        let outcome = client.reduce(reduce_request(line_token(), 2)).await;

        // Third delivery landed; the decrement applied exactly once.
        assert_eq!(outcome, ReduceOutcome::Committed);
        let record = store
            .inner
            .stock(&ProductId::new("P1"), &VariantKey::new("M"))
            .await
            .unwrap();
        assert_eq!(record.available, 3);
        assert_eq!(record.reserved, 2);
    }

    #[tokio::test]
    async fn reduce_falls_back_to_unavailable_when_retries_exhaust() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());
        store.fail_times(10);

        let outcome = client.reduce(reduce_request(line_token(), 2)).await;

        assert_eq!(outcome, ReduceOutcome::Unavailable);
        let record = store
            .inner
            .stock(&ProductId::new("P1"), &VariantKey::new("M"))
            .await
            .unwrap();
        assert_eq!(record.available, 5);
        assert_eq!(client.breaker().metrics().total_failures, 3);
    }

    #[tokio::test]
    async fn reduce_replay_maps_to_already_applied() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());
        let token = line_token();

        let first = client.reduce(reduce_request(token.clone(), 2)).await;
        let second = client.reduce(reduce_request(token, 2)).await;

        assert_eq!(first, ReduceOutcome::Committed);
        assert_eq!(second, ReduceOutcome::AlreadyApplied);
        assert!(second.is_committed());
    }

    #[tokio::test]
    async fn open_breaker_degrades_every_operation() {
        let store = seeded(100).await;
        let mut config = fast_config();
        config.breaker.failure_threshold = 2;
        let client = InventoryClient::with_config(Arc::clone(&store), config);

        // Two failed deliveries open the circuit mid-retry.
        store.fail_times(2);
        let outcome = client.reduce(reduce_request(line_token(), 1)).await;
        assert_eq!(outcome, ReduceOutcome::Unavailable);
        assert_eq!(client.breaker().state().await, BreakerState::Open);

        // The store is healthy again, but the open breaker answers
        // conservatively for all operations.
        assert_eq!(client.check(check_request(1)).await, CheckOutcome::Insufficient);
        assert_eq!(
            client.reduce(reduce_request(line_token(), 1)).await,
            ReduceOutcome::Unavailable
        );
        assert_eq!(
            client.restore(restore_request(line_token(), 1)).await,
            RestoreOutcome::Unavailable
        );
        assert!(client.breaker().metrics().total_rejections >= 3);
    }

    #[tokio::test]
    async fn check_is_not_retried() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());

        store.fail_times(1);
        let degraded = client.check(check_request(1)).await;
        assert_eq!(degraded, CheckOutcome::Insufficient);

        // The single injected failure was consumed by the one delivery.
        let healthy = client.check(check_request(1)).await;
        assert_eq!(healthy, CheckOutcome::Available);
    }

    #[tokio::test]
    async fn timeouts_degrade_then_token_retry_is_safe() {
        let store = seeded(5).await;
        let mut config = fast_config();
        config.call_timeout = Duration::from_millis(10);
        let client = InventoryClient::with_config(Arc::clone(&store), config);
        let token = line_token();

        store.delay(100);
        let outcome = client.reduce(reduce_request(token.clone(), 2)).await;
        assert_eq!(outcome, ReduceOutcome::Unavailable);

        // Once the store responds again, the same token lands cleanly.
        store.delay(0);
        let retried = client.reduce(reduce_request(token, 2)).await;
        assert_eq!(retried, ReduceOutcome::Committed);
        let record = store
            .inner
            .stock(&ProductId::new("P1"), &VariantKey::new("M"))
            .await
            .unwrap();
        assert_eq!(record.available, 3);
    }

    #[tokio::test]
    async fn restore_unavailable_until_store_recovers() {
        let store = seeded(5).await;
        let client = InventoryClient::with_config(Arc::clone(&store), fast_config());
        let token = line_token();

        client.reduce(reduce_request(token.clone(), 2)).await;

        store.fail_times(10);
        let degraded = client.restore(restore_request(token.clone(), 2)).await;
        assert_eq!(degraded, RestoreOutcome::Unavailable);
        assert!(!degraded.is_restored());

        store.fail_times(0);
        let restored = client.restore(restore_request(token, 2)).await;
        assert_eq!(restored, RestoreOutcome::Committed);
        let record = store
            .inner
            .stock(&ProductId::new("P1"), &VariantKey::new("M"))
            .await
            .unwrap();
        assert_eq!(record.available, 5);
    }

    #[tokio::test]
    async fn breaker_recovers_through_half_open_probe() {
        let store = seeded(5).await;
        let mut config = fast_config();
        config.breaker.failure_threshold = 2;
        let client = InventoryClient::with_config(Arc::clone(&store), config);

        store.fail_times(2);
        client.reduce(reduce_request(line_token(), 1)).await;
        assert_eq!(client.breaker().state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let outcome = client.reduce(reduce_request(line_token(), 1)).await;
        assert_eq!(outcome, ReduceOutcome::Committed);
        assert_eq!(client.breaker().state().await, BreakerState::Closed);
    }
}
