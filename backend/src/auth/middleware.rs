//! Middleware for protecting authenticated routes.
//!
//! `require_auth` wraps every `/api` route except the auth status endpoint and
//! stores the resolved [`AuthContext`](super::AuthContext) in the request
//! extensions.

use crate::errors::AppError;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());
    let context = state.auth.authenticate(header).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
