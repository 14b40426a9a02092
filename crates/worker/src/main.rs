//! Delivery worker pool.
//!
//! ```text
//! Redis ready list --BRPOP--> [worker 0..N]  --POST-->  target_url
//!                                   |
//!                      classify, persist attempt, advance D.status
//!                                   |
//!                       failed, retries left --> delayed ZSET (re-enqueue)
//! ```
//!
//! Alongside the worker pool, two housekeeping tasks run on fixed intervals:
//! a promoter that moves due jobs from the delayed ZSET onto the ready list,
//! and the retention sweeper (C7) that prunes old attempt logs.

mod delivery;
mod metrics;
mod retry;
mod sweeper;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::signal;
use tokio::sync::Barrier;
use tracing::{error, info, warn};

use delivery::WorkerContext;
use webhook_cache::RedisSubscriptionCache;
use webhook_common::{Config, RandJitter, SystemClock};
use webhook_queue::{RedisWorkQueue, WorkQueue};
use webhook_store::PostgresStore;

/// Shared service state for the worker's own health/ready endpoints.
#[derive(Clone)]
struct ServiceState {
    ready: Arc<AtomicBool>,
    workers_initialized: Arc<AtomicUsize>,
    worker_count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhook_common::init_tracing();
    info!("starting delivery worker");

    let config = Config::from_env()?;
    info!(
        worker_count = config.worker_count,
        max_retries = config.max_retries,
        request_timeout_secs = config.request_timeout_secs,
        "configuration loaded"
    );

    let pool = webhook_common::create_pool(&config.database_url, config.database_max_connections)
        .await?;
    let store: Arc<dyn webhook_store::StoreAdapter> = Arc::new(PostgresStore::new(pool));

    let redis_manager = webhook_common::open_connection_manager(&config.redis_url).await?;
    let queue: Arc<dyn WorkQueue> = Arc::new(RedisWorkQueue::new(redis_manager.clone()));
    let cache: Arc<dyn webhook_cache::SubscriptionCache> = Arc::new(RedisSubscriptionCache::new(
        redis_manager,
        config.cache_ttl_secs,
    ));

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let ctx = Arc::new(WorkerContext {
        store: store.clone(),
        queue: queue.clone(),
        cache,
        http_client,
        clock: Arc::new(SystemClock),
        jitter: Arc::new(RandJitter),
        max_retries: config.max_retries,
        request_timeout: config.request_timeout(),
        retry_base_delay_secs: config.retry_base_delay_secs,
        retry_max_delay_secs: config.retry_max_delay_secs,
    });

    let service_state = ServiceState {
        ready: Arc::new(AtomicBool::new(false)),
        workers_initialized: Arc::new(AtomicUsize::new(0)),
        worker_count: config.worker_count,
    };

    let health_state = service_state.clone();
    let health_port = config.worker_health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_port, health_state).await {
            error!(error = %e, "health server failed");
        }
    });

    let metrics_port = config.worker_metrics_port;
    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));
        let addr = format!("0.0.0.0:{metrics_port}");
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!(%addr, "metrics server listening");
                if let Err(e) = axum::serve(listener, app).await {
                    warn!(error = %e, "metrics server error");
                }
            }
            Err(e) => warn!(%addr, error = %e, "failed to bind metrics server"),
        }
    });

    sweeper::spawn(store, config.log_retention_hours, config.sweep_interval_secs);
    spawn_promoter(queue.clone());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let init_barrier = Arc::new(Barrier::new(config.worker_count + 1));

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
        let ctx = ctx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let barrier = init_barrier.clone();
        let state = service_state.clone();

        let handle = tokio::spawn(async move {
            state.workers_initialized.fetch_add(1, Ordering::SeqCst);
            barrier.wait().await;
            info!(worker_id, "worker ready, entering consume loop");
            worker_loop(worker_id, ctx, &mut shutdown_rx).await;
            info!(worker_id, "worker stopped");
        });
        handles.push(handle);
    }

    info!(
        worker_count = config.worker_count,
        "waiting for workers to initialize"
    );
    init_barrier.wait().await;
    service_state.ready.store(true, Ordering::SeqCst);
    info!("delivery worker is ready");

    let shutdown_reason = tokio::select! {
        _ = shutdown_signal() => "received shutdown signal",
        _ = async {
            for handle in &mut handles {
                let _ = handle.await;
            }
        } => "all workers stopped",
    };
    info!(reason = shutdown_reason, "shutting down delivery worker");

    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    info!("delivery worker stopped");
    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    shutdown_rx: &mut tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        if shutdown_rx.try_recv().is_ok() {
            return;
        }

        let job = match ctx.queue.consume(5).await {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                error!(worker_id, error = %e, "failed to consume from queue, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        metrics::JOBS_CONSUMED_TOTAL.inc();
        let (delivery_id, attempt_count) = job;
        delivery::process_message(&ctx, delivery_id, attempt_count).await;
    }
}

/// Move delayed jobs whose delay has elapsed onto the ready list, on a fixed
/// interval, mirroring the periodic-task shape used by the retention
/// sweeper and the teacher's own background-task idiom.
fn spawn_promoter(queue: Arc<dyn WorkQueue>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            match queue.promote_due().await {
                Ok(promoted) if promoted > 0 => {
                    info!(promoted, "promoted delayed jobs to the ready list");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to promote delayed jobs"),
            }
            if let Ok(len) = queue.ready_len().await {
                metrics::QUEUE_READY_LENGTH.set(len as i64);
            }
        }
    });
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn start_health_server(port: u16, state: ServiceState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind health server to {addr}"))?;

    info!(%addr, "health server listening");
    axum::serve(listener, app).await.context("health server failed")?;
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "webhook-worker",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn readiness_check(State(state): State<ServiceState>) -> (StatusCode, Json<Value>) {
    let is_ready = state.ready.load(Ordering::SeqCst);
    let workers_init = state.workers_initialized.load(Ordering::SeqCst);

    if is_ready {
        (
            StatusCode::OK,
            Json(json!({
                "ready": true,
                "workers_initialized": workers_init,
                "workers_total": state.worker_count,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ready": false,
                "workers_initialized": workers_init,
                "workers_total": state.worker_count,
            })),
        )
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
        _ = ctrl_c => warn!("received Ctrl+C, shutting down..."),
        _ = terminate => warn!("received terminate signal, shutting down..."),
    }
}
