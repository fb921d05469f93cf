//! API endpoints.

mod accounts;
mod admin;
mod approvals;
mod auth;
mod health;
mod notifications;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/accounts", accounts::router())
        .nest("/admin", admin::router())
        .nest("/approvals", approvals::router())
        .nest("/notifications", notifications::router())
}
