use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use webhook_domain::{
    CreateSubscriptionRequest, PaginatedSubscriptions, SubscriptionResponse,
    UpdateSubscriptionRequest,
};

use super::{err, ErrorResponse};
use crate::metrics::API_REQUESTS_TOTAL;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// `POST /subscriptions`.
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), (StatusCode, Json<ErrorResponse>)> {
    request.validate().map_err(|e| {
        API_REQUESTS_TOTAL
            .with_label_values(&["create_subscription", "bad_request"])
            .inc();
        err(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let subscription = state
        .store
        .insert_subscription(request.target_url, request.secret_key)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to create subscription");
            API_REQUESTS_TOTAL
                .with_label_values(&["create_subscription", "error"])
                .inc();
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?;

    API_REQUESTS_TOTAL
        .with_label_values(&["create_subscription", "created"])
        .inc();
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

/// `GET /subscriptions`.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PaginatedSubscriptions>, (StatusCode, Json<ErrorResponse>)> {
    let (subscriptions, total_count) = state
        .store
        .list_subscriptions(params.offset, params.limit)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to list subscriptions");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?;

    Ok(Json(PaginatedSubscriptions {
        total_count,
        subscriptions: subscriptions.into_iter().map(Into::into).collect(),
    }))
}

/// `GET /subscriptions/{id}`.
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let subscription = state.store.get_subscription(id).await.map_err(|e| {
        error!(error = %e, %id, "failed to load subscription");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;

    match subscription {
        Some(subscription) => Ok(Json(subscription.into())),
        None => Err(err(
            StatusCode::NOT_FOUND,
            format!("subscription {id} not found"),
        )),
    }
}

/// `PUT /subscriptions/{id}`.
///
/// The cache entry for `id` is invalidated unconditionally after a
/// successful update, even when nothing observable actually changed — a
/// stale cached subscription with a superseded secret or target is worse
/// than one extra cache miss.
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, (StatusCode, Json<ErrorResponse>)> {
    request.validate().map_err(|e| err(StatusCode::BAD_REQUEST, e.to_string()))?;

    let existing = state.store.get_subscription(id).await.map_err(|e| {
        error!(error = %e, %id, "failed to load subscription for update");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;
    if existing.is_none() {
        return Err(err(
            StatusCode::NOT_FOUND,
            format!("subscription {id} not found"),
        ));
    }

    let updated = state
        .store
        .update_subscription(id, request.target_url, request.secret_key)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "failed to update subscription");
            err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        })?
        .ok_or_else(|| err(StatusCode::NOT_FOUND, format!("subscription {id} not found")))?;

    state.cache.delete(id).await;

    Ok(Json(updated.into()))
}

/// `DELETE /subscriptions/{id}`.
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let deleted = state.store.delete_subscription(id).await.map_err(|e| {
        error!(error = %e, %id, "failed to delete subscription");
        err(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
    })?;

    if !deleted {
        return Err(err(
            StatusCode::NOT_FOUND,
            format!("subscription {id} not found"),
        ));
    }

    state.cache.delete(id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit_is_twenty() {
        assert_eq!(default_limit(), 20);
    }
}
