//! Delivery worker internals, exposed as a library so integration tests can
//! drive `process_message` directly against fakes and a mock HTTP target.

pub mod delivery;
pub mod metrics;
pub mod retry;
pub mod sweeper;

pub use delivery::{process_message, WorkerContext};
