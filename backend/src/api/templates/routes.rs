//! Defines the HTTP routes for project and user templates.

use super::handlers::{
    delete_template, delete_user_template, list_system_templates, list_user_templates,
    upload_template, upload_user_template,
};
use crate::AppState;
use axum::routing::{delete, get, post};
use axum::Router;

pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/:project_id/template",
            post(upload_template).delete(delete_template),
        )
        .route("/templates", get(list_system_templates))
        .route(
            "/user-templates",
            post(upload_user_template).get(list_user_templates),
        )
        .route("/user-templates/:template_id", delete(delete_user_template))
}
