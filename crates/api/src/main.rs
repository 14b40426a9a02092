//! Subscription management and status/analytics API.
//!
//! A thin pass-through HTTP surface over the same store the ingest and
//! worker services use: every handler is a direct store call mapped to a
//! response DTO, with no signature verification, queueing, or retry logic.

mod handlers;
mod metrics;
mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use handlers::status::{dashboard_stats, delivery_status, recent_activity, subscription_attempts};
use handlers::subscriptions::{
    create_subscription, delete_subscription, get_subscription, list_subscriptions,
    update_subscription,
};
use state::AppState;
use webhook_cache::RedisSubscriptionCache;
use webhook_common::Config;
use webhook_store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhook_common::init_tracing();
    info!("starting subscription/status API");

    let config = Config::from_env()?;

    let pool = webhook_common::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    let store = Arc::new(PostgresStore::new(pool));

    let redis_manager = webhook_common::open_connection_manager(&config.redis_url).await?;
    let cache = Arc::new(RedisSubscriptionCache::new(
        redis_manager,
        config.cache_ttl_secs,
    ));

    let state = AppState { store, cache };

    let app = Router::new()
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions", get(list_subscriptions))
        .route("/subscriptions/{id}", get(get_subscription))
        .route("/subscriptions/{id}", put(update_subscription))
        .route("/subscriptions/{id}", delete(delete_subscription))
        .route("/status/deliveries/{id}/status", get(delivery_status))
        .route(
            "/status/subscriptions/{id}/attempts",
            get(subscription_attempts),
        )
        .route("/status/stats", get(dashboard_stats))
        .route("/status/activity", get(recent_activity))
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("subscription/status API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("subscription/status API shut down gracefully");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::http::StatusCode {
    use webhook_store::StoreAdapter;
    match state.store.ping().await {
        Ok(()) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics_handler() -> Result<String, (axum::http::StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
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
