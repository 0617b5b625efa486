//! Inventory Client: the coordinator-side facade over the inventory store.
//!
//! Every call goes through a per-call timeout and a shared circuit breaker;
//! reduce and restore deliveries are retried with exponential backoff under
//! the same idempotency token. When the breaker is open or retries exhaust,
//! a [`FallbackPolicy`] supplies the outcome, and the conservative policy
//! never claims success: checks degrade to `Insufficient`, reduce and
//! restore to `Unavailable`. The client hands the coordinator an outcome in
//! every case; transport errors do not escape it.
//!
//! One client instance (and so one breaker) per downstream store, built at
//! startup and shared for the life of the process.

pub mod breaker;
pub mod client;
pub mod fallback;
pub mod outcome;
pub mod retry;

pub use breaker::{
    BreakerError, BreakerState, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
};
pub use client::{ClientConfig, InventoryClient};
pub use fallback::{ConservativeFallback, FallbackPolicy};
pub use outcome::{CheckOutcome, ReduceOutcome, RestoreOutcome};
pub use retry::RetryPolicy;
