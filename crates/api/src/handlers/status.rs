use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;
use webhook_domain::{ActivityItem, DeliveryAttempt, DeliveryStatusResponse, SystemStats};

use super::{err, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LimitParam {
    #[serde(default = "default_attempts_limit")]
    pub limit: i64,
}

fn default_attempts_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ActivityLimitParam {
    #[serde(default = "default_activity_limit")]
    pub limit: i64,
}

fn default_activity_limit() -> i64 {
    5
}

/// `GET /status/deliveries/{id}/status`.
pub async fn delivery_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let delivery = state.store.get_delivery(id).await.map_err(|e| {
        error!(error = %e, %id, "failed to load delivery");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;

    let delivery = match delivery {
        Some(delivery) => delivery,
        None => {
            return Err(err(
                StatusCode::NOT_FOUND,
                format!("delivery {id} not found"),
            ))
        }
    };

    let attempts = state.store.get_attempts_for_delivery(id).await.map_err(|e| {
        error!(error = %e, %id, "failed to load attempts for delivery");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;

    Ok(Json(DeliveryStatusResponse { delivery, attempts }))
}

/// `GET /status/subscriptions/{id}/attempts?limit=`.
///
/// No existence check on the subscription: an unknown or empty subscription
/// simply yields an empty attempt list, matching the reference behavior.
pub async fn subscription_attempts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitParam>,
) -> Result<Json<Vec<DeliveryAttempt>>, (StatusCode, Json<ErrorResponse>)> {
    let attempts = state
        .store
        .get_recent_attempts_for_subscription(id, params.limit)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "failed to load recent attempts for subscription");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?;

    Ok(Json(attempts))
}

/// `GET /status/stats`.
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<SystemStats>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state.store.get_dashboard_stats().await.map_err(|e| {
        error!(error = %e, "failed to compute dashboard stats");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;
    Ok(Json(stats))
}

/// `GET /status/activity?limit=`.
pub async fn recent_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityLimitParam>,
) -> Json<Vec<ActivityItem>> {
    let limit = params.limit.clamp(1, 20);
    match state.store.get_recent_activity(limit).await {
        Ok(items) => Json(items),
        Err(e) => {
            error!(error = %e, "failed to load recent activity feed; returning empty");
            Json(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        assert_eq!(default_attempts_limit(), 20);
        assert_eq!(default_activity_limit(), 5);
    }

    #[test]
    fn test_activity_limit_is_clamped() {
        assert_eq!(ActivityLimitParam { limit: 100 }.limit.clamp(1, 20), 20);
        assert_eq!(ActivityLimitParam { limit: 0 }.limit.clamp(1, 20), 1);
    }
}
