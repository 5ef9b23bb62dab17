//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the API domains: projects
//! and pages, generation, templates, materials, settings, the whitelist and
//! user profiles. Core authentication routes are handled separately in
//! `auth`. Every router here sits behind `require_auth`.

pub mod generation;
pub mod materials;
pub mod projects;
pub mod settings;
pub mod templates;
pub mod user;
pub mod whitelist;

use crate::auth::AuthContext;
use crate::database::models::Project;
use crate::database::queries;
use crate::errors::{AppError, AppResult};
use crate::services::generation::{Generation, WorkerLimits};
use crate::services::settings as settings_service;
use crate::AppState;
use axum::Router;
use std::sync::Arc;

/// All protected `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(projects::routes::project_routes())
        .merge(generation::routes::generation_routes())
        .merge(templates::routes::template_routes())
        .merge(materials::routes::material_routes())
        .merge(settings::routes::settings_routes())
        .merge(whitelist::routes::whitelist_routes())
        .merge(user::routes::user_routes())
}

/// Loads a project visible to the caller; other tenants' projects are 404.
pub(crate) async fn load_project(state: &AppState, auth: &AuthContext, project_id: &str) -> AppResult<Project> {
    let id = project_id.to_string();
    let tenant = auth.tenant();
    state
        .db
        .call(move |conn| queries::get_project(conn, &id, tenant.as_deref()))
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

/// Generation services configured from the current settings.
pub(crate) async fn generation_service(state: &AppState) -> AppResult<Generation> {
    let settings = settings_service::load(&state.db, &state.config).await?;
    let ai = state.ai.service(&settings).await?;
    Ok(Generation::new(
        state.db.clone(),
        Arc::clone(&state.files),
        state.tasks.clone(),
        ai,
        WorkerLimits::from(&settings),
    ))
}
