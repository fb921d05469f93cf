//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use placement_common::AppError;
use placement_core::{
    AccountService, ApprovalEngine, AuthorizationGuard, NotificationService, RegistrationService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub guard: AuthorizationGuard,
    pub account_service: AccountService,
    pub registration_service: RegistrationService,
    pub approval_engine: ApprovalEngine,
    pub notification_service: NotificationService,
}

/// Authentication middleware.
///
/// A request without a bearer token passes through anonymous. A request
/// with a token that does not resolve is answered with the resolution error.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match req.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token) => Some(token.trim().to_string()),
            None => {
                return AppError::InvalidCredential("malformed Authorization header".to_string())
                    .into_response();
            }
        },
    };

    if let Some(token) = token {
        match state.guard.resolve(&token).await {
            Ok(caller) => {
                req.extensions_mut().insert(caller);
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}
