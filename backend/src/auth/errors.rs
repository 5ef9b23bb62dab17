//! Custom error types specific to authentication failures.
//!
//! Every variant maps to a 401 except the whitelist and admin gates, which
//! are 403s with their own codes.

use crate::errors::AppError;
use adapters::AdapterError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format. Expected: Bearer <token>")]
    InvalidHeader,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("identity provider not configured")]
    NotConfigured,

    #[error("Token verification failed: {0}")]
    Verification(String),

    #[error("Your email is not authorized to access this application")]
    EmailNotAllowed,

    #[error("Admin access required")]
    AdminRequired,
}

impl From<AdapterError> for AuthError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::TokenExpired => Self::TokenExpired,
            AdapterError::InvalidToken(reason) => Self::InvalidToken(reason),
            AdapterError::Configuration(_) => Self::NotConfigured,
            other => Self::Verification(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailNotAllowed => {
                AppError::api(StatusCode::FORBIDDEN, "EMAIL_NOT_ALLOWED", err.to_string())
            }
            AuthError::AdminRequired => AppError::Forbidden(err.to_string()),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}
