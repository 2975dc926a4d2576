use crate::{directory::DirectoryError, models::ApiError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// AuthError
///
/// Every way a login or an authorization check can fail. The `Display` strings are what
/// clients see, so none of them carry internal detail; the underlying cause of an
/// infrastructure failure is kept as the error `source` for logging only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Authentication required")]
    SessionExpiredOrUnknown,

    #[error("Admin access required")]
    InsufficientRole,

    /// The account directory could not be consulted. Always fails the request closed.
    #[error("Service temporarily unavailable")]
    DirectoryUnavailable(#[from] DirectoryError),

    #[error("Internal server error")]
    Internal(String),
}

impl AuthError {
    /// Machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountInactive => "inactive_account",
            AuthError::SessionExpiredOrUnknown => "no_session",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::DirectoryUnavailable(_) => "directory_unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::SessionExpiredOrUnknown => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::DirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// browser_message
    ///
    /// The human-readable text placed in the `error` query parameter of a redirect.
    pub fn browser_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid username or password",
            AuthError::AccountInactive => "Your account has been deactivated",
            AuthError::SessionExpiredOrUnknown => "Please login to access this page",
            AuthError::InsufficientRole => "Access denied - Admin privileges required",
            AuthError::DirectoryUnavailable(_) | AuthError::Internal(_) => {
                "An unexpected error occurred"
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ApiError {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
