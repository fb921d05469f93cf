//! Registration and sign-in endpoints.

use axum::{Json, Router, extract::State, routing::post};
use placement_common::AppResult;
use placement_core::{
    LoginInput, RegisterAccountInput, RegisterOrganizationInput, RegisteredOrganization,
    TokenPair,
};
use placement_db::entities::account;
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Sign up an organization together with its first member.
async fn register_organization(
    State(state): State<AppState>,
    Json(req): Json<RegisterOrganizationInput>,
) -> AppResult<ApiResponse<RegisteredOrganization>> {
    let registered = state
        .registration_service
        .register_organization(req)
        .await?;
    Ok(ApiResponse::created(registered))
}

/// Sign up into an existing organization.
async fn register_account(
    State(state): State<AppState>,
    Json(req): Json<RegisterAccountInput>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state.registration_service.register_account(req).await?;
    Ok(ApiResponse::created(account))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<TokenPair>> {
    let tokens = state.account_service.login(req).await?;
    Ok(ApiResponse::ok(tokens))
}

/// Refresh request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<TokenPair>> {
    let tokens = state.account_service.refresh(&req.refresh_token).await?;
    Ok(ApiResponse::ok(tokens))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/organization", post(register_organization))
        .route("/register/account", post(register_account))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}
