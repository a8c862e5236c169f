//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use common::ProviderKey;
use fulfillment::{FulfillmentConfig, RetryPolicy};

/// Server and orchestrator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: Postgres order store; in-memory when unset
/// - `KFC_API_URL`, `SILPO_API_URL`, `UKLON_API_URL`, `UBER_API_URL`:
///   provider base URLs
/// - `KFC_WEBHOOK_TOKEN`, `UBER_WEBHOOK_TOKEN`: secret path segments
///   for the webhook endpoints
/// - `POLL_INTERVAL_MS`, `ORDER_TTL_SECS`, `MAPPING_TTL_SECS`
/// - `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_MS`, `RETRY_MAX_MS`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub kfc_api_url: String,
    pub silpo_api_url: String,
    pub uklon_api_url: String,
    pub uber_api_url: String,
    pub kfc_webhook_token: String,
    pub uber_webhook_token: String,
    pub poll_interval_ms: u64,
    pub order_ttl_secs: u64,
    pub mapping_ttl_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("HOST", defaults.host),
            port: env_parse("PORT", defaults.port),
            log_level: env_string("RUST_LOG", defaults.log_level),
            database_url: std::env::var("DATABASE_URL").ok(),
            kfc_api_url: env_string("KFC_API_URL", defaults.kfc_api_url),
            silpo_api_url: env_string("SILPO_API_URL", defaults.silpo_api_url),
            uklon_api_url: env_string("UKLON_API_URL", defaults.uklon_api_url),
            uber_api_url: env_string("UBER_API_URL", defaults.uber_api_url),
            kfc_webhook_token: env_string("KFC_WEBHOOK_TOKEN", defaults.kfc_webhook_token),
            uber_webhook_token: env_string("UBER_WEBHOOK_TOKEN", defaults.uber_webhook_token),
            poll_interval_ms: env_parse("POLL_INTERVAL_MS", defaults.poll_interval_ms),
            order_ttl_secs: env_parse("ORDER_TTL_SECS", defaults.order_ttl_secs),
            mapping_ttl_secs: env_parse("MAPPING_TTL_SECS", defaults.mapping_ttl_secs),
            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_base_ms: env_parse("RETRY_BASE_MS", defaults.retry_base_ms),
            retry_max_ms: env_parse("RETRY_MAX_MS", defaults.retry_max_ms),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The orchestrator's slice of the configuration.
    pub fn fulfillment(&self) -> FulfillmentConfig {
        FulfillmentConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            order_ttl: Duration::from_secs(self.order_ttl_secs),
            mapping_ttl: Duration::from_secs(self.mapping_ttl_secs),
            retry: RetryPolicy::new(
                self.retry_max_attempts,
                Duration::from_millis(self.retry_base_ms),
                Duration::from_millis(self.retry_max_ms),
            ),
        }
    }

    pub fn order_ttl(&self) -> Duration {
        Duration::from_secs(self.order_ttl_secs)
    }

    pub fn mapping_ttl(&self) -> Duration {
        Duration::from_secs(self.mapping_ttl_secs)
    }

    /// Expected secret path segment per webhook provider.
    pub fn webhook_tokens(&self) -> HashMap<ProviderKey, String> {
        HashMap::from([
            (ProviderKey::new("kfc"), self.kfc_webhook_token.clone()),
            (ProviderKey::new("uber"), self.uber_webhook_token.clone()),
        ])
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            kfc_api_url: "http://localhost:8001".to_string(),
            silpo_api_url: "http://localhost:8002".to_string(),
            uklon_api_url: "http://localhost:8003".to_string(),
            uber_api_url: "http://localhost:8004".to_string(),
            kfc_webhook_token: "3d4d05d9-835e-433d-bb3b-e218bcbfa431".to_string(),
            uber_webhook_token: "e7a684e0-03e3-46ba-97eb-f3604abc494c".to_string(),
            poll_interval_ms: 1_000,
            order_ttl_secs: 24 * 60 * 60,
            mapping_ttl_secs: 24 * 60 * 60,
            retry_max_attempts: 5,
            retry_base_ms: 200,
            retry_max_ms: 5_000,
        }
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
