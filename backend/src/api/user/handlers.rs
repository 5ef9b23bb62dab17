//! Handler functions for the user profile.

use crate::auth::AuthContext;
use crate::database::queries;
use crate::errors::{ApiResponse, AppResult};
use crate::AppState;
use axum::extract::State;
use serde_json::{json, Value};

/// `GET /api/user/profile`
///
/// With auth disabled there is no user: `{user: null, is_admin: false}`.
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<ApiResponse<Value>> {
    let Some(current) = auth.user else {
        return Ok(ApiResponse::ok(json!({ "user": null, "is_admin": false })));
    };
    let id = current.id.clone();
    let stored = state
        .db
        .call(move |conn| queries::get_user(conn, &id))
        .await?;
    let user = match stored {
        Some(user) => json!(user),
        None => json!(current),
    };
    Ok(ApiResponse::ok(json!({ "user": user, "is_admin": current.is_admin })))
}
