//! Error types for the placement service.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient role: {0}")]
    InsufficientRole(String),

    #[error("Cross-organization access denied")]
    CrossOrganizationAccess,

    #[error("Caller does not own this resource")]
    NotOwner,

    #[error("Account is not approved")]
    AccountNotApproved,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Token expired")]
    Expired,

    #[error("Unknown account")]
    UnknownAccount,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredential(_) | Self::Expired | Self::UnknownAccount => {
                StatusCode::UNAUTHORIZED
            }
            Self::InsufficientRole(_)
            | Self::CrossOrganizationAccess
            | Self::NotOwner
            | Self::AccountNotApproved
            | Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::InvalidStateTransition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,

            // 5xx Server Errors
            Self::Database(_)
            | Self::Queue(_)
            | Self::Mail(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::InsufficientRole(_) => "INSUFFICIENT_ROLE",
            Self::CrossOrganizationAccess => "CROSS_ORGANIZATION_ACCESS",
            Self::NotOwner => "NOT_OWNER",
            Self::AccountNotApproved => "ACCOUNT_NOT_APPROVED",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::InvalidCredential(_) => "INVALID_CREDENTIAL",
            Self::Expired => "TOKEN_EXPIRED",
            Self::UnknownAccount => "UNKNOWN_ACCOUNT",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Mail(_) => "MAIL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
