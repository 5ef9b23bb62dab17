//! Defines the HTTP routes for whitelist administration.

use super::handlers::{add_email, check_admin, list_emails, remove_email};
use crate::AppState;
use axum::routing::{delete, get};
use axum::Router;

pub fn whitelist_routes() -> Router<AppState> {
    Router::new()
        .route("/whitelist", get(list_emails).post(add_email))
        .route("/whitelist/check-admin", get(check_admin))
        .route("/whitelist/:email", delete(remove_email))
}
