//! Defines the HTTP routes for settings and service self-tests.

use super::handlers::{get_settings, reset_settings, run_service_test, update_settings};
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/reset", post(reset_settings))
        .route("/settings/tests/:name", post(run_service_test))
}
