//! Application configuration loaded from environment variables.

use std::time::Duration;

use inventory_client::{CircuitBreakerConfig, ClientConfig, RetryPolicy};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `INVENTORY_CALL_TIMEOUT_MS` — per-delivery timeout for store calls
///   (default: `500`)
/// - `BREAKER_FAILURE_THRESHOLD` — consecutive failures before the store
///   circuit opens (default: `5`)
/// - `BREAKER_COOLDOWN_MS` — how long an open circuit rejects before
///   probing (default: `30000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub call_timeout_ms: u64,
    pub breaker_failure_threshold: usize,
    pub breaker_cooldown_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            call_timeout_ms: env_parse("INVENTORY_CALL_TIMEOUT_MS", defaults.call_timeout_ms),
            breaker_failure_threshold: env_parse(
                "BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            ),
            breaker_cooldown_ms: env_parse("BREAKER_COOLDOWN_MS", defaults.breaker_cooldown_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Inventory client settings derived from the environment knobs.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            retry: RetryPolicy::default(),
            breaker: CircuitBreakerConfig {
                failure_threshold: self.breaker_failure_threshold,
                open_cooldown: Duration::from_millis(self.breaker_cooldown_ms),
                ..CircuitBreakerConfig::default()
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let breaker = CircuitBreakerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            call_timeout_ms: 500,
            breaker_failure_threshold: breaker.failure_threshold,
            breaker_cooldown_ms: breaker.open_cooldown.as_millis() as u64,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.call_timeout_ms, 500);
    }

    #[test]
    fn socket_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn client_config_carries_the_knobs() {
        let config = Config {
            call_timeout_ms: 250,
            breaker_failure_threshold: 3,
            breaker_cooldown_ms: 1500,
            ..Config::default()
        };

        let client = config.client_config();
        assert_eq!(client.call_timeout, Duration::from_millis(250));
        assert_eq!(client.breaker.failure_threshold, 3);
        assert_eq!(client.breaker.open_cooldown, Duration::from_millis(1500));
    }
}
