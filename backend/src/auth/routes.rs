//! Defines the HTTP routes specifically for authentication.

use super::handlers::auth_status;
use crate::AppState;
use axum::{routing::get, Router};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/status", get(auth_status))
}
