//! Configuration management for the booking server.
//!
//! Loads configuration from environment variables with sensible defaults.

use bookings_runtime::{RetryPolicy, SystemConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and metrics listener settings
    pub server: ServerConfig,
    /// `PostgreSQL` settings; `None` selects in-memory storage
    pub database: Option<DatabaseConfig>,
    /// Payment simulation and notification delivery settings
    pub runtime: RuntimeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Metrics host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Runtime tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Probability that a simulated payment is declined, 0.0 to 1.0
    pub payment_failure_rate: f64,
    /// Currency used when a request names none
    pub payment_currency: String,
    /// Seconds between keep-alive frames on realtime connections
    pub heartbeat_interval_secs: u64,
    /// Per-connection delivery buffer
    pub subscriber_channel_capacity: usize,
    /// Retries when storing a notification fails transiently
    pub notification_retry_max: usize,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
            });

        Self {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "SERVER_PORT", 8080),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parse_or(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parse_or(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            database,
            runtime: RuntimeConfig {
                payment_failure_rate: parse_or(&lookup, "PAYMENT_FAILURE_RATE", 0.1_f64)
                    .clamp(0.0, 1.0),
                payment_currency: lookup("PAYMENT_CURRENCY")
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| "USD".to_string()),
                heartbeat_interval_secs: parse_or(&lookup, "HEARTBEAT_INTERVAL_SECS", 30_u64).max(1),
                subscriber_channel_capacity: parse_or(&lookup, "SUBSCRIBER_CHANNEL_CAPACITY", 64_usize)
                    .max(1),
                notification_retry_max: parse_or(&lookup, "NOTIFICATION_RETRY_MAX", 3),
            },
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address advertised for Prometheus scraping.
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }

    /// How long shutdown waits for the notification outbox to drain.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// Runtime settings for [`bookings_runtime::BookingSystem::build`].
    #[must_use]
    pub fn system_config(&self) -> SystemConfig {
        SystemConfig {
            failure_rate: self.runtime.payment_failure_rate,
            currency: self.runtime.payment_currency.clone(),
            heartbeat: Duration::from_secs(self.runtime.heartbeat_interval_secs),
            channel_capacity: self.runtime.subscriber_channel_capacity,
            retry: RetryPolicy::builder()
                .max_retries(self.runtime.notification_retry_max)
                .build(),
            seed: None,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.metrics_addr(), "0.0.0.0:9090");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert!(config.database.is_none());
        assert!((config.runtime.payment_failure_rate - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.runtime.payment_currency, "USD");
        assert_eq!(config.runtime.heartbeat_interval_secs, 30);
        assert_eq!(config.runtime.subscriber_channel_capacity, 64);
        assert_eq!(config.runtime.notification_retry_max, 3);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "3000"),
            ("METRICS_PORT", "9100"),
            ("SHUTDOWN_TIMEOUT", "5"),
            ("DATABASE_URL", "postgres://localhost/bookings"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("PAYMENT_CURRENCY", "EUR"),
            ("HEARTBEAT_INTERVAL_SECS", "15"),
            ("NOTIFICATION_RETRY_MAX", "0"),
        ]);

        assert_eq!(config.server_addr(), "127.0.0.1:3000");
        assert_eq!(config.metrics_addr(), "0.0.0.0:9100");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        let database = config.database.as_ref().map(|db| (db.url.as_str(), db.max_connections));
        assert_eq!(database, Some(("postgres://localhost/bookings", 4)));

        let system = config.system_config();
        assert_eq!(system.currency, "EUR");
        assert_eq!(system.heartbeat, Duration::from_secs(15));
        assert_eq!(system.retry.max_retries, 0);
    }

    #[test]
    fn failure_rate_is_clamped() {
        let high = config_from(&[("PAYMENT_FAILURE_RATE", "1.7")]);
        let low = config_from(&[("PAYMENT_FAILURE_RATE", "-0.5")]);

        assert!((high.runtime.payment_failure_rate - 1.0).abs() < f64::EPSILON);
        assert!(low.runtime.payment_failure_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = config_from(&[
            ("SERVER_PORT", "eighty"),
            ("PAYMENT_FAILURE_RATE", "often"),
            ("SUBSCRIBER_CHANNEL_CAPACITY", "0"),
            ("DATABASE_URL", "  "),
        ]);

        assert_eq!(config.server.port, 8080);
        assert!((config.runtime.payment_failure_rate - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.runtime.subscriber_channel_capacity, 1);
        assert!(config.database.is_none());
    }
}
