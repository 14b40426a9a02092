//! Shared Redis connection bootstrap, used by both the queue and cache crates.

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use crate::error::Result;

/// Open a Redis connection manager, which transparently reconnects on
/// transient connection loss.
pub async fn open_connection_manager(redis_url: &str) -> Result<ConnectionManager> {
    info!("connecting to Redis at {}", redis_url);
    let client = Client::open(redis_url).map_err(|e| crate::error::Error::Cache(e.to_string()))?;
    let manager = ConnectionManager::new(client)
        .await
        .map_err(|e| crate::error::Error::Cache(e.to_string()))?;
    info!("redis connection established");
    Ok(manager)
}
