//! Prometheus metrics for the ingestion service.

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref INGEST_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "ingest_requests_total",
        "Total ingestion requests by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref INGEST_DURATION: HistogramVec = prometheus::register_histogram_vec!(
        "ingest_request_duration_seconds",
        "Ingestion request handling duration",
        &["outcome"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
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
