//! HTTP API layer for the placement service.
//!
//! - **Endpoints**: registration, sign-in, approvals, admin, notifications
//! - **Extractors**: the resolved caller
//! - **Middleware**: bearer token resolution
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub use endpoints::router;
pub use middleware::AppState;

/// Request bodies larger than this are refused.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Requests taking longer than this are aborted.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The full application: `/api` routes with auth, tracing and CORS layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
