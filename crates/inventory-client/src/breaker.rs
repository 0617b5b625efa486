use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// How long an open circuit rejects before probing again.
    pub open_cooldown: Duration,
    /// Successful probes required in HalfOpen before closing. Also caps
    /// how many probes may be in flight at once while half-open.
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests pass through normally; failures are counted.
    Closed,
    /// Requests are rejected immediately until the cooldown elapses.
    Open,
    /// Limited probe traffic is testing whether the store recovered.
    HalfOpen,
}

/// Errors from calls made through the circuit breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Circuit is open, request rejected without calling the store.
    #[error("Circuit breaker is open")]
    Open,
    /// The underlying call failed.
    #[error("Operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: usize,
    success_count: usize,
    half_open_inflight: usize,
    last_failure_time: Option<Instant>,
}

/// Client-side guard that stops calling a failing store for a cooldown
/// period.
///
/// Closed counts consecutive failures and opens at the threshold. Open
/// rejects instantly until the cooldown elapses, then HalfOpen admits at
/// most `success_threshold` probes: all succeeding closes the circuit, any
/// failing reopens it.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<RwLock<BreakerInner>>,
    total_calls: Arc<AtomicU64>,
    total_successes: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    /// Creates a new closed circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_inflight: 0,
                last_failure_time: None,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_successes: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the current state.
    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }

    /// Calls an operation through the circuit breaker.
    ///
    /// Returns `BreakerError::Open` without invoking the operation when the
    /// circuit rejects, `BreakerError::Inner` when the operation fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if !self.can_attempt().await {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("circuit breaker is open, rejecting call");
            return Err(BreakerError::Open);
        }

        match operation().await {
            Ok(result) => {
                self.on_success().await;
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                Ok(result)
            }
            Err(err) => {
                self.on_failure().await;
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                Err(BreakerError::Inner(err))
            }
        }
    }

    async fn can_attempt(&self) -> bool {
        let mut inner = self.inner.write().await;

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                // Admit only as many probes as successes still needed.
                if inner.success_count + inner.half_open_inflight
                    < self.config.success_threshold
                {
                    inner.half_open_inflight += 1;
                    true
                } else {
                    false
                }
            }
            BreakerState::Open => {
                let cooled_down = inner
                    .last_failure_time
                    .is_some_and(|at| at.elapsed() >= self.config.open_cooldown);
                if cooled_down {
                    tracing::info!("circuit breaker transitioning OPEN -> HALF_OPEN");
                    inner.state = BreakerState::HalfOpen;
                    inner.success_count = 0;
                    inner.half_open_inflight = 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.write().await;

        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_inflight = inner.half_open_inflight.saturating_sub(1);
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.success_count,
                        "circuit breaker transitioning HALF_OPEN -> CLOSED"
                    );
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.half_open_inflight = 0;
                    inner.last_failure_time = None;
                }
            }
            BreakerState::Open => {
                inner.failure_count = 0;
            }
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "circuit breaker transitioning CLOSED -> OPEN"
                    );
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("circuit breaker transitioning HALF_OPEN -> OPEN, probe failed");
                inner.state = BreakerState::Open;
                inner.failure_count = 1;
                inner.success_count = 0;
                inner.half_open_inflight = 0;
            }
            BreakerState::Open => {
                inner.failure_count += 1;
            }
        }
    }

    /// Returns cumulative call counters.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }

    /// Forces the breaker back to closed. For tests and manual
    /// intervention.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        tracing::info!("circuit breaker manually reset to CLOSED");
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.half_open_inflight = 0;
        inner.last_failure_time = None;
    }
}

/// Cumulative counters for one circuit breaker.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(failure_threshold: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            open_cooldown: Duration::from_millis(50),
            success_threshold: 2,
        }
    }

    #[tokio::test]
    async fn stays_closed_on_success() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;

        assert!(result.is_ok());
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(fast_config(3));

        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }

        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let breaker = CircuitBreaker::new(fast_config(3));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        let _ = breaker.call(|| async { Ok::<_, &str>(1) }).await;
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }

        // Never three in a row.
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn rejects_without_calling_when_open() {
        let breaker = CircuitBreaker::new(fast_config(2));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }

        let mut invoked = false;
        let result = breaker
            .call(|| {
                invoked = true;
                async { Ok::<_, String>(42) }
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert!(!invoked);
        assert_eq!(breaker.metrics().total_rejections, 1);
    }

    #[tokio::test]
    async fn cooldown_moves_open_to_half_open() {
        let breaker = CircuitBreaker::new(fast_config(2));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state().await, BreakerState::HalfOpen);
    }

    #[tokio::test]
    async fn closes_after_success_threshold_probes() {
        let breaker = CircuitBreaker::new(fast_config(2));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        for _ in 0..2 {
            let _ = breaker.call(|| async { Ok::<_, String>(42) }).await;
        }

        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(fast_config(2));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;

        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_limits_probe_traffic() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_cooldown: Duration::from_millis(10),
            success_threshold: 1,
        });

        let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // First probe holds the only half-open slot; a second concurrent
        // attempt is rejected while it is in flight.
        let probe = breaker.call(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, String>(1)
        });
        let second = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            breaker.call(|| async { Ok::<_, String>(2) }).await
        };

        let (probe_result, second_result) = tokio::join!(probe, second);
        assert!(probe_result.is_ok());
        assert!(matches!(second_result, Err(BreakerError::Open)));
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn reset_closes_the_circuit() {
        let breaker = CircuitBreaker::new(fast_config(2));

        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);

        breaker.reset().await;

        assert_eq!(breaker.state().await, BreakerState::Closed);
        let result = breaker.call(|| async { Ok::<_, String>(42) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn counters_track_call_outcomes() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        for _ in 0..3 {
            let _ = breaker.call(|| async { Ok::<_, String>(42) }).await;
        }
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<i32, _>("error") }).await;
        }

        let metrics = breaker.metrics();
        assert_eq!(metrics.total_calls, 5);
        assert_eq!(metrics.total_successes, 3);
        assert_eq!(metrics.total_failures, 2);
        assert_eq!(metrics.total_rejections, 0);
    }
}
