//! Defines the HTTP routes for user profiles.

use super::handlers::get_profile;
use crate::AppState;
use axum::routing::get;
use axum::Router;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile))
}
