//! Retention sweeper (C7): periodically prunes `delivery_attempts` rows older
//! than the configured retention window. Never touches `webhook_deliveries`
//! or `subscriptions`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{info, warn};

use webhook_store::StoreAdapter;

use crate::metrics;

/// Run one sweep, deleting attempt rows older than `retention_hours`.
/// A `retention_hours <= 0` disables the sweep entirely.
pub async fn run_once(store: &dyn StoreAdapter, retention_hours: i64) {
    if retention_hours <= 0 {
        info!("attempt log retention disabled (LOG_RETENTION_HOURS <= 0)");
        return;
    }

    let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);
    match store.delete_attempts_older_than(cutoff).await {
        Ok(deleted) => {
            metrics::SWEEP_DELETED_TOTAL.inc_by(deleted);
            info!(deleted, %cutoff, "retention sweep finished");
        }
        Err(e) => {
            warn!(error = %e, "retention sweep failed");
        }
    }
}

/// Spawn the sweeper as a background task that runs once immediately and
/// then on a fixed interval, following the same periodic-loop shape as the
/// worker pool's job consumption loop.
pub fn spawn(store: Arc<dyn StoreAdapter>, retention_hours: i64, interval_secs: u64) {
    tokio::spawn(async move {
        run_once(store.as_ref(), retention_hours).await;

        let mut interval = time::interval(Duration::from_secs(interval_secs));
        interval.tick().await; // first tick fires immediately; we already ran once above
        loop {
            interval.tick().await;
            run_once(store.as_ref(), retention_hours).await;
        }
    });
}
