//! The delivery state machine (C6): one pass over a single queue message —
//! resolve the subscription, attempt the HTTP POST, classify the outcome,
//! persist an attempt row, and advance `D.status`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};
use uuid::Uuid;

use webhook_cache::SubscriptionCache;
use webhook_common::{Clock, Jitter};
use webhook_domain::{AttemptOutcome, DeliveryStatus, NewDeliveryAttempt};
use webhook_queue::WorkQueue;
use webhook_store::StoreAdapter;

use crate::{metrics, retry};

/// Truncate a response body to a 1 KiB cap before it is persisted.
const RESPONSE_BODY_CAP: usize = 1024;

pub struct WorkerContext {
    pub store: Arc<dyn StoreAdapter>,
    pub queue: Arc<dyn WorkQueue>,
    pub cache: Arc<dyn SubscriptionCache>,
    pub http_client: Client,
    pub clock: Arc<dyn Clock>,
    pub jitter: Arc<dyn Jitter>,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
}

/// Process one queue message: `delivery_id` with `attempt_count` prior
/// attempts already made (0 on first dispatch). Returns once the message has
/// been fully handled — success, terminal failure, or a fresh re-enqueue.
pub async fn process_message(ctx: &WorkerContext, delivery_id: Uuid, attempt_count: u32) {
    let attempt_number = attempt_count + 1;

    let delivery = match ctx.store.get_delivery(delivery_id).await {
        Ok(Some(d)) => d,
        Ok(None) => {
            warn!(%delivery_id, "delivery not found, discarding message");
            return;
        }
        Err(e) => {
            error!(%delivery_id, error = %e, "store error loading delivery, discarding message");
            return;
        }
    };

    if delivery.status.is_terminal() {
        info!(%delivery_id, status = ?delivery.status, "delivery already terminal, skipping");
        return;
    }

    let subscription = match ctx.cache.get(delivery.subscription_id).await {
        Some(s) => s,
        None => match ctx.store.get_subscription(delivery.subscription_id).await {
            Ok(Some(s)) => {
                ctx.cache.set(&s).await;
                s
            }
            Ok(None) => {
                warn!(%delivery_id, subscription_id = %delivery.subscription_id, "subscription missing, failing delivery");
                let now = ctx.clock.now();
                if let Err(e) = ctx
                    .store
                    .update_delivery_status(delivery_id, DeliveryStatus::Failed, Some(now))
                    .await
                {
                    error!(%delivery_id, error = %e, "failed to mark delivery failed");
                }
                let attempt = NewDeliveryAttempt {
                    delivery_id,
                    attempt_number: attempt_number as i32,
                    outcome: AttemptOutcome::Failed,
                    status_code: None,
                    response_body: None,
                    error_message: Some("subscription missing".to_string()),
                };
                if let Err(e) = ctx.store.insert_attempt(attempt).await {
                    error!(%delivery_id, error = %e, "failed to log subscription-missing attempt");
                }
                metrics::DELIVERY_ATTEMPTS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                return;
            }
            Err(e) => {
                error!(%delivery_id, error = %e, "store error loading subscription, discarding message");
                return;
            }
        },
    };

    if delivery.status != DeliveryStatus::Processing {
        if let Err(e) = ctx
            .store
            .update_delivery_status(delivery_id, DeliveryStatus::Processing, None)
            .await
        {
            error!(%delivery_id, error = %e, "failed to mark delivery processing");
        }
    }

    let body = serde_json::to_vec(&delivery.payload).unwrap_or_else(|_| b"{}".to_vec());

    let mut request = ctx
        .http_client
        .post(&subscription.target_url)
        .timeout(ctx.request_timeout)
        .header("Content-Type", "application/json");

    if let Some(secret) = subscription.secret_key.as_deref() {
        let signature = webhook_common::sign(secret, &body);
        request = request.header("X-Webhook-Signature-256", format!("sha256={signature}"));
    }

    let start = ctx.clock.now();
    let outcome = request.body(body).send().await;
    let duration = (ctx.clock.now() - start)
        .to_std()
        .unwrap_or(Duration::ZERO);

    let (is_success, status_code, response_body, error_message) = match outcome {
        Ok(response) => {
            let status = response.status();
            let status_code = Some(status.as_u16() as i32);
            let body_text = response.text().await.ok();
            let truncated = body_text.map(|b| b.chars().take(RESPONSE_BODY_CAP).collect());
            if status.is_success() {
                (true, status_code, truncated, None)
            } else {
                (
                    false,
                    status_code,
                    truncated,
                    Some(format!("target returned non-2xx status: {}", status.as_u16())),
                )
            }
        }
        Err(e) if e.is_timeout() => (
            false,
            None,
            None,
            Some(format!(
                "request timed out after {} s",
                ctx.request_timeout.as_secs()
            )),
        ),
        Err(e) => (false, None, None, Some(format!("request failed: {e}"))),
    };

    metrics::DELIVERY_DURATION.observe(duration.as_secs_f64());

    let attempt = NewDeliveryAttempt {
        delivery_id,
        attempt_number: attempt_number as i32,
        outcome: if is_success {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failed
        },
        status_code,
        response_body,
        error_message,
    };

    if let Err(e) = ctx.store.insert_attempt(attempt).await {
        error!(%delivery_id, error = %e, "failed to persist delivery attempt");
    }

    let now = ctx.clock.now();

    if is_success {
        metrics::DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&["success"])
            .inc();
        if let Err(e) = ctx
            .store
            .update_delivery_status(delivery_id, DeliveryStatus::Success, Some(now))
            .await
        {
            error!(%delivery_id, error = %e, "failed to mark delivery success");
        }
        info!(%delivery_id, attempt_number, "delivery succeeded");
        return;
    }

    metrics::DELIVERY_ATTEMPTS_TOTAL
        .with_label_values(&["failed"])
        .inc();

    if attempt_number > ctx.max_retries {
        if let Err(e) = ctx
            .store
            .update_delivery_status(delivery_id, DeliveryStatus::Failed, Some(now))
            .await
        {
            error!(%delivery_id, error = %e, "failed to mark delivery terminally failed");
        }
        warn!(%delivery_id, attempt_number, "delivery failed permanently");
        return;
    }

    if let Err(e) = ctx
        .store
        .update_delivery_status(delivery_id, DeliveryStatus::FailedAttempt, Some(now))
        .await
    {
        error!(%delivery_id, error = %e, "failed to mark delivery failed_attempt");
    }

    let delay = retry::calculate_backoff(
        attempt_number,
        ctx.retry_base_delay_secs,
        ctx.retry_max_delay_secs,
        ctx.jitter.as_ref(),
    );

    metrics::RETRY_ATTEMPTS_TOTAL.inc();
    warn!(%delivery_id, attempt_number, delay_secs = delay, "delivery failed, scheduling retry");

    if let Err(e) = ctx.queue.enqueue(delivery_id, attempt_count + 1, delay).await {
        error!(%delivery_id, error = %e, "failed to re-enqueue delivery for retry");
    }
}
