//! Prometheus metrics for the subscription and status API.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "api_requests_total",
        "Total API requests by route and outcome",
        &["route", "outcome"]
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
