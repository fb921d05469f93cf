//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, post},
};
use placement_common::AppResult;
use placement_core::{CreateAccountInput, CreateOrganizationInput};
use placement_db::entities::{account, organization};

use crate::{
    extractors::AuthCaller,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Create an approved, verified organization.
async fn create_organization(
    AuthCaller(admin): AuthCaller,
    State(state): State<AppState>,
    Json(req): Json<CreateOrganizationInput>,
) -> AppResult<ApiResponse<organization::Model>> {
    let organization = state
        .registration_service
        .create_organization(&admin, req)
        .await?;
    Ok(ApiResponse::created(organization))
}

/// Create an approved account.
async fn create_account(
    AuthCaller(admin): AuthCaller,
    State(state): State<AppState>,
    Json(req): Json<CreateAccountInput>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state
        .registration_service
        .create_account(&admin, req)
        .await?;
    Ok(ApiResponse::created(account))
}

async fn deactivate(
    AuthCaller(admin): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state.account_service.deactivate(&admin, &id).await?;
    Ok(ApiResponse::ok(account))
}

async fn reactivate(
    AuthCaller(admin): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state.account_service.reactivate(&admin, &id).await?;
    Ok(ApiResponse::ok(account))
}

async fn delete_account(
    AuthCaller(admin): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.account_service.delete(&admin, &id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/organizations", post(create_organization))
        .route("/accounts", post(create_account))
        .route("/accounts/{id}", delete(delete_account))
        .route("/accounts/{id}/deactivate", post(deactivate))
        .route("/accounts/{id}/reactivate", post(reactivate))
}
