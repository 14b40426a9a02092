//! Signed webhook ingestion service.
//!
//! ```text
//! External caller --POST /ingest/{subscription_id}--> [ingest]
//!                                                         |
//!                                        verify signature, parse JSON
//!                                                         |
//!                                      insert delivery row, enqueue job
//!                                                         v
//!                                                 Redis work queue
//! ```

mod handlers;
mod metrics;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use handlers::{health_check, ingest, metrics_handler, AppState};
use webhook_common::Config;
use webhook_queue::RedisWorkQueue;
use webhook_store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhook_common::init_tracing();
    info!("starting ingestion service");

    let config = Config::from_env()?;

    let pool = webhook_common::create_pool(&config.database_url, config.database_max_connections)
        .await?;

    match sqlx::migrate!("../../migrations").run(&pool).await {
        Ok(_) => info!("database migrations completed"),
        Err(sqlx::migrate::MigrateError::VersionMissing(_)) => {
            info!("database migrations already applied, skipping");
        }
        Err(e) => {
            if !e.to_string().contains("already exists") {
                return Err(e.into());
            }
            info!("database migrations already applied, skipping");
        }
    }

    let store = Arc::new(PostgresStore::new(pool));

    let redis_manager = webhook_common::open_connection_manager(&config.redis_url).await?;
    let queue = Arc::new(RedisWorkQueue::new(redis_manager));

    let state = AppState { store, queue };

    let app = Router::new()
        .route("/ingest/{subscription_id}", post(ingest))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.ingest_host, config.ingest_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("ingestion service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ingestion service shut down gracefully");
    Ok(())
}

async fn ready_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::http::StatusCode {
    match state.store.ping().await {
        Ok(()) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            warn!("received terminate signal, shutting down...");
        },
    }
}
