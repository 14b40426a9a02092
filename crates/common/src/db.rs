//! PostgreSQL connection pool management.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;

/// Create a PostgreSQL connection pool, verifying connectivity with a health check.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!(
        "creating database pool with max_connections={}",
        max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    health_check(&pool).await?;

    info!("database pool created successfully");

    Ok(pool)
}

/// Run `SELECT 1` to confirm the pool can reach the database.
pub async fn health_check(pool: &PgPool) -> Result<()> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if row.0 == 1 {
        Ok(())
    } else {
        warn!("database health check failed");
        Err(crate::error::Error::Database(sqlx::Error::Protocol(
            "health check failed".into(),
        )))
    }
}

/// Current pool size and idle connection count, for readiness/metrics reporting.
pub fn pool_stats(pool: &PgPool) -> (u32, usize) {
    (pool.size(), pool.num_idle())
}
