//! Shared infrastructure used by the `ingest`, `worker`, and `api` services.
//!
//! This crate provides:
//! - PostgreSQL connection pooling (sqlx)
//! - Redis connection bootstrap
//! - Custom error types
//! - HMAC-SHA256 signing/verification for webhook payloads
//! - Environment-driven configuration
//! - Injectable clock/jitter sources for deterministic retry tests
//! - Structured logging setup

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod redis_client;

pub use auth::{sign, verify_signature};
pub use clock::{Clock, FixedClock, FixedJitter, Jitter, RandJitter, SystemClock};
pub use config::Config;
pub use db::create_pool;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use redis_client::open_connection_manager;
