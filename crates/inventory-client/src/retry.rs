use std::time::Duration;

/// Bounded exponential backoff for idempotent deliveries.
///
/// Retrying is only safe because reduce and restore are keyed by an
/// idempotency token; the policy itself just spaces the attempts out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total deliveries including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Ceiling for the backoff.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before the given retry, where `retry` is 1 for
    /// the first retry: `base_delay * 2^(retry - 1)`, capped at
    /// `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    /// True when `attempt` (1-based) was the last allowed delivery.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
