//! Defines the HTTP routes for materials.

use super::handlers::{delete_material, generate_material, list_materials};
use crate::AppState;
use axum::routing::{delete, get, post};
use axum::Router;

pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_materials))
        .route("/materials/generate", post(generate_material))
        .route("/materials/:material_id", delete(delete_material))
}
