//! Account endpoint handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use crate::api::middleware::Requester;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::domain::account::{Account, AccountPatch};
use crate::domain::{ListQuery, Page};
use crate::infrastructure::services::CreateAccountRequest;

/// POST /api/accounts
pub async fn create_account(
    State(state): State<AppState>,
    Requester(user): Requester,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    debug!(%user, "Creating account");

    let account = state.accounts.create(user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(account).with_message("Account created")),
    ))
}

/// GET /api/accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    Requester(user): Requester,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Page<Account>>>, ApiError> {
    debug!(%user, page = query.page, "Listing accounts");

    let result = state.accounts.list(user, &query).await?;

    Ok(Json(
        ApiResponse::ok(result.value).from_cache(result.from_cache),
    ))
}

/// GET /api/accounts/{id}
pub async fn get_account(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    debug!(%user, %id, "Getting account");

    let result = state.accounts.get(user, id).await?;

    Ok(Json(
        ApiResponse::ok(result.value).from_cache(result.from_cache),
    ))
}

/// PUT /api/accounts/{id}
pub async fn update_account(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> Result<Json<ApiResponse<Account>>, ApiError> {
    debug!(%user, %id, "Updating account");

    let account = state.accounts.update(user, id, patch).await?;

    Ok(Json(ApiResponse::ok(account).with_message("Account updated")))
}

/// DELETE /api/accounts/{id}
pub async fn delete_account(
    State(state): State<AppState>,
    Requester(user): Requester,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    debug!(%user, %id, "Deleting account");

    state.accounts.delete(user, id).await?;

    Ok(Json(ApiResponse {
        success: true,
        message: Some("Account deleted".to_string()),
        data: None,
        from_cache: None,
    }))
}
