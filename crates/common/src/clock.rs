//! Injectable time and jitter sources.
//!
//! The retry scheduler (`crates/worker`) needs to be exercised deterministically
//! in tests without sleeping real seconds or depending on wall-clock time, so
//! both the clock and the jitter draw are behind small traits with fake
//! implementations available to any crate that depends on `webhook-common`.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns a fixed instant, settable for tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Source of the jitter fraction applied to backoff delays, uniform in
/// `[-0.5, 0.5)`.
pub trait Jitter: Send + Sync {
    fn sample(&self) -> f64;
}

/// `rand::thread_rng()`-backed implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandJitter;

impl Jitter for RandJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(-0.5..0.5)
    }
}

/// A jitter source that always returns a fixed value, for deterministic
/// backoff assertions in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}
