//! Prometheus metrics for the delivery worker.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder};

lazy_static! {
    /// Delivery attempts by outcome (`success` / `failed`).
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "worker_delivery_attempts_total",
        "Total delivery attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    /// Outbound HTTP request duration, covering the full attempt.
    pub static ref DELIVERY_DURATION: Histogram = prometheus::register_histogram!(
        "worker_delivery_duration_seconds",
        "Outbound webhook delivery duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    /// Jobs consumed from the ready list.
    pub static ref JOBS_CONSUMED_TOTAL: IntCounter = prometheus::register_int_counter!(
        "worker_jobs_consumed_total",
        "Total jobs consumed from the delivery queue"
    )
    .unwrap();

    /// Retries scheduled (failed attempts that were not yet terminal).
    pub static ref RETRY_ATTEMPTS_TOTAL: IntCounter = prometheus::register_int_counter!(
        "worker_retry_attempts_total",
        "Total retries scheduled after a failed attempt"
    )
    .unwrap();

    /// Attempt rows pruned by the most recent retention sweep.
    pub static ref SWEEP_DELETED_TOTAL: IntCounter = prometheus::register_int_counter!(
        "worker_sweep_deleted_total",
        "Total delivery_attempts rows deleted by the retention sweeper"
    )
    .unwrap();

    /// Approximate ready-list length, sampled by the promoter loop.
    pub static ref QUEUE_READY_LENGTH: IntGauge = prometheus::register_int_gauge!(
        "worker_queue_ready_length",
        "Approximate length of the delivery queue ready list"
    )
    .unwrap();
}

pub fn render_metrics() -> anyhow::Result<String> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
