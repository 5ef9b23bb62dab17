//! Defines the HTTP routes for outline, description and image generation.

use super::handlers::{
    edit_page_image, generate_descriptions, generate_images, generate_outline,
    generate_page_description, generate_page_image, get_task, refine_descriptions,
    refine_outline,
};
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn generation_routes() -> Router<AppState> {
    Router::new()
        .route("/projects/:project_id/generate/outline", post(generate_outline))
        .route("/projects/:project_id/refine/outline", post(refine_outline))
        .route(
            "/projects/:project_id/generate/descriptions",
            post(generate_descriptions),
        )
        .route(
            "/projects/:project_id/refine/descriptions",
            post(refine_descriptions),
        )
        .route("/projects/:project_id/generate/images", post(generate_images))
        .route(
            "/projects/:project_id/pages/:page_id/generate/description",
            post(generate_page_description),
        )
        .route(
            "/projects/:project_id/pages/:page_id/generate/image",
            post(generate_page_image),
        )
        .route(
            "/projects/:project_id/pages/:page_id/edit/image",
            post(edit_page_image),
        )
        .route("/projects/:project_id/tasks/:task_id", get(get_task))
}
