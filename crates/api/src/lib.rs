//! Subscription/status API handler internals, exposed as a library so
//! integration tests can drive the CRUD handlers directly against fakes.

pub mod handlers;
pub mod metrics;
pub mod state;

pub use state::AppState;
