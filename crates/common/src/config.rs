//! Environment-driven configuration shared by the `ingest`, `worker`, and
//! `api` binaries.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Knobs governing the delivery pipeline: retry budget, timeouts, retention,
/// pool sizing, and connection strings. Loaded once at process start via
/// [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,

    /// Maximum number of *retries* after the first attempt (default 5, for
    /// up to 6 total attempts).
    pub max_retries: u32,
    /// Base delay for the exponential backoff schedule, in seconds.
    pub retry_base_delay_secs: u64,
    /// Cap on the backoff delay, in seconds, before jitter is applied.
    pub retry_max_delay_secs: u64,
    /// Per-attempt HTTP timeout, in seconds.
    pub request_timeout_secs: u64,

    /// TTL for cached subscriptions, in seconds.
    pub cache_ttl_secs: u64,

    /// How long delivery attempt logs are retained, in hours. `<= 0` disables
    /// the retention sweeper entirely.
    pub log_retention_hours: i64,
    /// How often the retention sweeper runs, in seconds.
    pub sweep_interval_secs: u64,

    pub worker_count: usize,

    pub ingest_host: String,
    pub ingest_port: u16,
    pub api_host: String,
    pub api_port: u16,
    pub worker_health_port: u16,
    pub worker_metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
            redis_url: env::var("REDIS_URL").context("REDIS_URL must be set")?,

            max_retries: env_or("WEBHOOK_MAX_RETRIES", 5),
            retry_base_delay_secs: env_or("RETRY_BASE_DELAY_SECONDS", 10),
            retry_max_delay_secs: env_or("RETRY_MAX_DELAY_SECONDS", 900),
            request_timeout_secs: env_or("WEBHOOK_DELIVERY_TIMEOUT_SECONDS", 10),

            cache_ttl_secs: env_or("CACHE_TTL_SECONDS", 300),

            log_retention_hours: env_or("LOG_RETENTION_HOURS", 72),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECONDS", 86400),

            worker_count: env_or("WORKER_COUNT", 10),

            ingest_host: env::var("INGEST_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            ingest_port: env_or("INGEST_PORT", 8080),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env_or("API_PORT", 8081),
            worker_health_port: env_or("WORKER_HEALTH_PORT", 8082),
            worker_metrics_port: env_or("WORKER_METRICS_PORT", 9090),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
