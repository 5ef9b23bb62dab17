//! Handler functions for the email whitelist.

use crate::auth::{AdminContext, AuthContext};
use crate::database::models::AllowedEmail;
use crate::database::queries;
use crate::errors::{ApiResponse, AppError, AppResult, OptionalJson};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct AddEmailRequest {
    pub email: Option<String>,
}

/// Normalizes and checks an address: lower-cased, trimmed, and containing
/// both `@` and `.`.
pub fn validate_email(email: Option<&str>) -> AppResult<String> {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::bad_request("Email is required"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(AppError::bad_request("Invalid email format"));
    }
    Ok(email)
}

/// `GET /api/whitelist`
pub async fn list_emails(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> AppResult<ApiResponse<Value>> {
    let emails = state.db.call(queries::list_allowed_emails).await?;
    Ok(ApiResponse::ok(json!({ "emails": emails, "is_admin": true })))
}

/// `POST /api/whitelist`
pub async fn add_email(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    OptionalJson(body): OptionalJson<AddEmailRequest>,
) -> AppResult<ApiResponse<AllowedEmail>> {
    let body = body.unwrap_or_default();
    let email = validate_email(body.email.as_deref())?;
    let added_by = admin.email().unwrap_or("system").to_string();

    let by = added_by.clone();
    let row = state
        .db
        .call(move |conn| queries::add_allowed_email(conn, &email, Some(&by)))
        .await?;
    info!(email = %row.email, added_by = %added_by, "Email added to whitelist");
    Ok(ApiResponse::ok(row).with_message("Email added to whitelist"))
}

/// `DELETE /api/whitelist/:email`
pub async fn remove_email(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Path(email): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let email = email.trim().to_lowercase();
    if state.auth.is_admin(&email) {
        return Err(AppError::api(
            StatusCode::BAD_REQUEST,
            "CANNOT_REMOVE_ADMIN",
            "Cannot remove admin email from whitelist",
        ));
    }

    let target = email.clone();
    let removed = state
        .db
        .call(move |conn| queries::remove_allowed_email(conn, &target))
        .await?;
    if !removed {
        return Err(AppError::api(
            StatusCode::NOT_FOUND,
            "EMAIL_NOT_FOUND",
            "Email not found in whitelist",
        ));
    }
    info!(
        email = %email,
        removed_by = admin.email().unwrap_or("system"),
        "Email removed from whitelist"
    );
    Ok(ApiResponse::ok(Value::Null).with_message("Email removed from whitelist"))
}

/// `GET /api/whitelist/check-admin`
pub async fn check_admin(State(state): State<AppState>, auth: AuthContext) -> ApiResponse<Value> {
    let is_admin = auth.email().is_some_and(|email| state.auth.is_admin(email));
    ApiResponse::ok(json!({ "is_admin": is_admin }))
}
