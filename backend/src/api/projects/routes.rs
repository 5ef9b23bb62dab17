//! Defines the HTTP routes for projects, pages and page image versions.

use super::handlers::{
    create_page, create_project, delete_page, delete_project, get_project, list_image_versions,
    list_projects, set_current_image_version, update_page_description, update_page_outline,
    update_project,
};
use crate::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:project_id/pages", post(create_page))
        .route("/projects/:project_id/pages/:page_id", delete(delete_page))
        .route(
            "/projects/:project_id/pages/:page_id/outline",
            put(update_page_outline),
        )
        .route(
            "/projects/:project_id/pages/:page_id/description",
            put(update_page_description),
        )
        .route(
            "/projects/:project_id/pages/:page_id/image-versions",
            get(list_image_versions),
        )
        .route(
            "/projects/:project_id/pages/:page_id/image-versions/:version_id/set-current",
            post(set_current_image_version),
        )
}
