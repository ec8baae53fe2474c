//! Activity endpoint handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use super::payments::BulkAccountsRequest;
use crate::api::middleware::Requester;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::domain::activity::Activity;
use crate::domain::{ListQuery, Page};
use crate::infrastructure::services::LogActivityRequest;

/// POST /api/accounts/{id}/activities
pub async fn log_activity(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(account_id): Path<Uuid>,
    Json(request): Json<LogActivityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Activity>>), ApiError> {
    debug!(%user, %account_id, "Logging activity");

    let activity = state.activities.log(user, account_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(activity).with_message("Activity logged")),
    ))
}

/// GET /api/accounts/{id}/activities
pub async fn list_activities(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Page<Activity>>>, ApiError> {
    debug!(%user, %account_id, "Listing activities");

    let result = state.activities.history(account_id, &query).await?;

    Ok(Json(
        ApiResponse::ok(result.value).from_cache(result.from_cache),
    ))
}

/// POST /api/activities/bulk
pub async fn bulk_activities(
    State(state): State<AppState>,
    Requester(user): Requester,
    Query(query): Query<ListQuery>,
    Json(request): Json<BulkAccountsRequest>,
) -> Result<Json<ApiResponse<Page<Activity>>>, ApiError> {
    debug!(%user, accounts = request.account_ids.len(), "Listing bulk activities");

    let page = state
        .activities
        .bulk_history(&request.account_ids, &query)
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}
