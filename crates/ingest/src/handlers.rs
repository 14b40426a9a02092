use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use webhook_queue::WorkQueue;
use webhook_store::StoreAdapter;

use crate::metrics::{INGEST_DURATION, INGEST_REQUESTS_TOTAL};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreAdapter>,
    pub queue: Arc<dyn WorkQueue>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn err(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// `POST /ingest/{subscription_id}`.
///
/// Ordering is load-bearing: the signature is verified against the exact raw
/// bytes received, before those bytes are parsed as JSON — parsing first
/// would make verification meaningless for a malicious payload shaped to
/// parse differently than it signs.
pub async fn ingest(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let start = Instant::now();

    let subscription = state
        .store
        .get_subscription(subscription_id)
        .await
        .map_err(|e| {
            error!(error = %e, %subscription_id, "store error while loading subscription");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?
        .ok_or_else(|| {
            INGEST_REQUESTS_TOTAL.with_label_values(&["not_found"]).inc();
            err(StatusCode::NOT_FOUND, "unknown subscription")
        })?;

    let signature_header = headers
        .get("X-Webhook-Signature-256")
        .and_then(|v| v.to_str().ok());

    if !webhook_common::verify_signature(subscription.secret_key.as_deref(), &body, signature_header)
    {
        INGEST_REQUESTS_TOTAL.with_label_values(&["unauthorized"]).inc();
        return Err(err(StatusCode::UNAUTHORIZED, "invalid signature"));
    }

    let payload: Value = if body.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            INGEST_REQUESTS_TOTAL.with_label_values(&["bad_request"]).inc();
            err(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}"))
        })?
    };

    let delivery = state
        .store
        .insert_delivery(subscription_id, payload)
        .await
        .map_err(|e| {
            error!(error = %e, %subscription_id, "failed to persist delivery");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?;

    if let Err(e) = state.queue.enqueue(delivery.id, 0, 0).await {
        warn!(error = %e, delivery_id = %delivery.id, "failed to enqueue delivery; it remains pending");
        INGEST_REQUESTS_TOTAL.with_label_values(&["enqueue_error"]).inc();
        return Err(err(StatusCode::INTERNAL_SERVER_ERROR, "queue error"));
    }

    INGEST_REQUESTS_TOTAL.with_label_values(&["accepted"]).inc();
    INGEST_DURATION
        .with_label_values(&["accepted"])
        .observe(start.elapsed().as_secs_f64());

    Ok(StatusCode::ACCEPTED)
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    crate::metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
