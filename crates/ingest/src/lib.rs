//! Ingestion handler internals, exposed as a library so integration tests can
//! drive `ingest` directly against fakes without a running HTTP server.

pub mod handlers;
pub mod metrics;

pub use handlers::{health_check, ingest, metrics_handler, AppState};
