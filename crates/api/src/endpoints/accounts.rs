//! Account endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use placement_common::AppResult;
use placement_db::entities::account;

use crate::{extractors::AuthCaller, middleware::AppState, response::ApiResponse};

async fn me(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state.account_service.me(&caller).await?;
    Ok(ApiResponse::ok(account))
}

async fn show(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<account::Model>> {
    let account = state.account_service.get(&caller, &id).await?;
    Ok(ApiResponse::ok(account))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/{id}", get(show))
}
