//! Notification endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use placement_common::AppResult;
use placement_db::entities::notification;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthCaller, middleware::AppState, response::ApiResponse};

/// Inbox query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    /// Maximum results (default: 10, max: 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Cursor for pagination (before this ID)
    pub until_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}

const fn default_limit() -> u64 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Count {
    count: u64,
}

async fn list(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<ApiResponse<Vec<notification::Model>>> {
    let notifications = state
        .notification_service
        .list(
            &caller,
            query.limit,
            query.until_id.as_deref(),
            query.unread_only,
        )
        .await?;
    Ok(ApiResponse::ok(notifications))
}

async fn mark_read(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<notification::Model>> {
    let notification = state.notification_service.mark_read(&caller, &id).await?;
    Ok(ApiResponse::ok(notification))
}

async fn mark_all_read(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Count>> {
    let count = state.notification_service.mark_all_read(&caller).await?;
    Ok(ApiResponse::ok(Count { count }))
}

async fn unread_count(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Count>> {
    let count = state.notification_service.count_unread(&caller).await?;
    Ok(ApiResponse::ok(Count { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
}
