//! Payment endpoint handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::Requester;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::{ListQuery, Page};
use crate::infrastructure::services::RecordPaymentRequest;

/// Body of a bulk history request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAccountsRequest {
    #[serde(default)]
    pub account_ids: Vec<Uuid>,
}

/// Body of a status update request
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: String,
}

/// POST /api/accounts/{id}/payments
pub async fn record_payment(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(account_id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Payment>>), ApiError> {
    debug!(%user, %account_id, "Recording payment");

    let payment = state.payments.record(user, account_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(payment).with_message("Payment recorded successfully")),
    ))
}

/// GET /api/accounts/{id}/payments
pub async fn list_payments(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Page<Payment>>>, ApiError> {
    debug!(%user, %account_id, "Listing payments");

    let result = state.payments.history(account_id, &query).await?;

    Ok(Json(
        ApiResponse::ok(result.value).from_cache(result.from_cache),
    ))
}

/// POST /api/payments/bulk
pub async fn bulk_payments(
    State(state): State<AppState>,
    Requester(user): Requester,
    Query(query): Query<ListQuery>,
    Json(request): Json<BulkAccountsRequest>,
) -> Result<Json<ApiResponse<Page<Payment>>>, ApiError> {
    debug!(%user, accounts = request.account_ids.len(), "Listing bulk payments");

    let page = state
        .payments
        .bulk_history(&request.account_ids, &query)
        .await?;

    Ok(Json(ApiResponse::ok(page)))
}

/// PUT /api/payments/{id}
pub async fn update_payment_status(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    debug!(%user, %id, status = %request.status, "Updating payment status");

    let status = PaymentStatus::parse(&request.status).ok_or_else(|| {
        ApiError::bad_request(
            "Invalid payment status. Allowed: PENDING, COMPLETED, FAILED, REFUNDED",
        )
    })?;

    let payment = state.payments.update_status(id, status).await?;

    Ok(Json(
        ApiResponse::ok(payment).with_message("Payment status updated"),
    ))
}
