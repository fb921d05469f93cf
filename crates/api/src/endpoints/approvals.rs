//! Approval endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use placement_common::AppResult;
use placement_core::{
    AccountDecision, ApprovalStatistics, BulkDecision, DecisionAction, MAX_PAGE_SIZE,
    OrganizationDecision, PendingApprovals, Target, actions, authorize,
};
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AuthCaller, middleware::AppState, response::ApiResponse};

/// Approve or reject one entity.
///
/// `action` stays a string so an unknown value is a validation error
/// rather than a body rejection.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub action: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Approve or reject several organizations at once.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkDecisionRequest {
    pub organization_ids: Vec<String>,
    pub action: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Pending listing query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

async fn pending(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> AppResult<ApiResponse<PendingApprovals>> {
    authorize(&caller, &actions::LIST_PENDING, &Target::any())?;

    let pending = state
        .approval_engine
        .list_pending(
            caller.review_scope(),
            query.limit.clamp(1, MAX_PAGE_SIZE),
            query.offset,
        )
        .await?;
    Ok(ApiResponse::ok(pending))
}

async fn stats(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ApprovalStatistics>> {
    authorize(&caller, &actions::VIEW_STATISTICS, &Target::any())?;

    let statistics = state
        .approval_engine
        .statistics(caller.review_scope())
        .await?;
    Ok(ApiResponse::ok(statistics))
}

async fn decide_organization(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<ApiResponse<OrganizationDecision>> {
    state
        .approval_engine
        .authorize_organization_decision(&caller, &id)
        .await?;
    req.validate()?;
    let action: DecisionAction = req.action.parse()?;

    let decision = state
        .approval_engine
        .decide_organization(&id, action, &caller.account_id, req.notes)
        .await?;
    Ok(ApiResponse::ok(decision))
}

async fn decide_account(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<ApiResponse<AccountDecision>> {
    state
        .approval_engine
        .authorize_account_decision(&caller, &id)
        .await?;
    req.validate()?;
    let action: DecisionAction = req.action.parse()?;

    let decision = state
        .approval_engine
        .decide_account(&id, action, &caller.account_id, req.notes)
        .await?;
    Ok(ApiResponse::ok(decision))
}

async fn bulk_decide(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Json(req): Json<BulkDecisionRequest>,
) -> AppResult<ApiResponse<BulkDecision>> {
    req.validate()?;
    let action: DecisionAction = req.action.parse()?;
    state
        .approval_engine
        .authorize_bulk_decision(&caller, &req.organization_ids)
        .await?;

    let decision = state
        .approval_engine
        .bulk_decide_organizations(&req.organization_ids, action, &caller.account_id, req.notes)
        .await?;
    Ok(ApiResponse::ok(decision))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(pending))
        .route("/stats", get(stats))
        .route("/organizations/bulk", post(bulk_decide))
        .route("/organizations/{id}", post(decide_organization))
        .route("/accounts/{id}", post(decide_account))
}
