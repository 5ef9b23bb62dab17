//! Data structures for authentication-related entities.
//!
//! `AuthContext` is attached to every request by `require_auth` and is the
//! source of the tenant scope used by queries.

use crate::errors::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use std::convert::Infallible;

/// The verified caller.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

/// Per-request authentication state. `user` is `None` when auth is disabled.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<CurrentUser>,
}

impl AuthContext {
    /// User id to scope queries by; `None` means unscoped.
    pub fn tenant(&self) -> Option<String> {
        self.user.as_ref().map(|user| user.id.clone())
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.email.as_str())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Requires the caller to be an admin when auth is enabled.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AdminContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default();
        state.auth.require_admin(&context)?;
        Ok(Self(context))
    }
}
