//! Logging and tracing setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing, reading the level from `RUST_LOG` (default `info`).
///
/// ```
/// webhook_common::init_tracing();
/// tracing::info!("server starting");
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .compact(),
        )
        .init();
}

/// Initialize tracing with JSON-formatted output, for log aggregation in production.
pub fn init_tracing_json() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_current_span(true),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{error, info, warn};

    #[test]
    fn test_tracing_init() {
        let _result = std::panic::catch_unwind(|| {
            init_tracing();
        });

        info!("test log message");
        warn!(count = 42, "warning with structured data");
        error!(error = "test error", "error message");
    }
}
