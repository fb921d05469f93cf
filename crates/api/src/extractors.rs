//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use placement_common::AppError;
use placement_core::CallerContext;

/// Authenticated caller extractor.
#[derive(Debug, Clone)]
pub struct AuthCaller(pub CallerContext);

impl<S> FromRequestParts<S> for AuthCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .map(AuthCaller)
            .ok_or_else(|| AppError::InvalidCredential("missing bearer token".to_string()))
    }
}
