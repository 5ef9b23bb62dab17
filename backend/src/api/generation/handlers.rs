//! Handler functions for the generation API.

use crate::api::projects::models::PageView;
use crate::api::{generation_service, load_project};
use crate::auth::AuthContext;
use crate::database::models::{Page, Task};
use crate::database::queries;
use crate::errors::{ApiJson, ApiResponse, AppError, AppResult, OptionalJson};
use crate::AppState;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    #[serde(default)]
    pub user_requirement: String,
    #[serde(default)]
    pub previous_requirements: Vec<String>,
}

impl RefineRequest {
    fn requirement(&self) -> AppResult<&str> {
        let requirement = self.user_requirement.trim();
        if requirement.is_empty() {
            return Err(AppError::bad_request("user_requirement is required"));
        }
        Ok(requirement)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateImagesRequest {
    pub page_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct EditImageRequest {
    #[serde(default)]
    pub edit_instruction: String,
}

fn pages_response(pages: &[Page]) -> ApiResponse<Value> {
    let pages: Vec<PageView> = pages.iter().map(PageView::from).collect();
    ApiResponse::ok(json!({ "pages": pages }))
}

fn task_started(task: &Task) -> ApiResponse<Value> {
    ApiResponse::accepted(json!({
        "task_id": task.id,
        "status": task.status,
        "total": task.progress.total,
    }))
}

async fn ensure_page(state: &AppState, project_id: &str, page_id: &str) -> AppResult<()> {
    let (project_id, page_id) = (project_id.to_string(), page_id.to_string());
    state
        .db
        .call(move |conn| queries::get_page(conn, &project_id, &page_id))
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Page not found"))
}

/// `POST /api/projects/:project_id/generate/outline`
pub async fn generate_outline(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let pages = generation_service(&state)
        .await?
        .generate_outline(&project)
        .await?;
    Ok(pages_response(&pages))
}

/// `POST /api/projects/:project_id/refine/outline`
pub async fn refine_outline(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<RefineRequest>,
) -> AppResult<ApiResponse<Value>> {
    let requirement = body.requirement()?;
    let project = load_project(&state, &auth, &project_id).await?;
    let pages = generation_service(&state)
        .await?
        .refine_outline(&project, requirement, &body.previous_requirements)
        .await?;
    Ok(pages_response(&pages).with_message("Outline refined"))
}

/// `POST /api/projects/:project_id/generate/descriptions`
pub async fn generate_descriptions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let task = generation_service(&state)
        .await?
        .start_descriptions(&project)
        .await?;
    Ok(task_started(&task))
}

/// `POST /api/projects/:project_id/pages/:page_id/generate/description`
pub async fn generate_page_description(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<PageView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    ensure_page(&state, &project.id, &page_id).await?;
    let page = generation_service(&state)
        .await?
        .generate_page_description(&project, &page_id)
        .await?;
    Ok(ApiResponse::ok(PageView::from(&page)))
}

/// `POST /api/projects/:project_id/refine/descriptions`
pub async fn refine_descriptions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<RefineRequest>,
) -> AppResult<ApiResponse<Value>> {
    let requirement = body.requirement()?;
    let project = load_project(&state, &auth, &project_id).await?;
    let pages = generation_service(&state)
        .await?
        .refine_descriptions(&project, requirement, &body.previous_requirements)
        .await?;
    Ok(pages_response(&pages).with_message("Descriptions refined"))
}

/// `POST /api/projects/:project_id/generate/images`
pub async fn generate_images(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    OptionalJson(body): OptionalJson<GenerateImagesRequest>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let page_ids = body.and_then(|body| body.page_ids);
    let task = generation_service(&state)
        .await?
        .start_images(&project, page_ids.as_deref())
        .await?;
    Ok(task_started(&task))
}

/// `POST /api/projects/:project_id/pages/:page_id/generate/image`
pub async fn generate_page_image(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    ensure_page(&state, &project.id, &page_id).await?;
    let task = generation_service(&state)
        .await?
        .start_images(&project, Some(std::slice::from_ref(&page_id)))
        .await?;
    Ok(task_started(&task))
}

/// `POST /api/projects/:project_id/pages/:page_id/edit/image`
pub async fn edit_page_image(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<EditImageRequest>,
) -> AppResult<ApiResponse<Value>> {
    let instruction = body.edit_instruction.trim();
    if instruction.is_empty() {
        return Err(AppError::bad_request("edit_instruction is required"));
    }
    let project = load_project(&state, &auth, &project_id).await?;
    let task = generation_service(&state)
        .await?
        .start_edit(&project, &page_id, instruction)
        .await?;
    Ok(task_started(&task))
}

/// `GET /api/projects/:project_id/tasks/:task_id`
pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<Task>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let task = state
        .db
        .call(move |conn| queries::get_task(conn, &project.id, &task_id))
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    Ok(ApiResponse::ok(task))
}
