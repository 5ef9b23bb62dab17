//! Handler functions for authentication-related API endpoints.

use crate::errors::ApiResponse;
use crate::AppState;
use axum::extract::State;
use serde_json::{json, Value};

/// `GET /api/auth/status`, reachable without a token.
pub async fn auth_status(State(state): State<AppState>) -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "auth_enabled": state.auth.is_enabled() }))
}
