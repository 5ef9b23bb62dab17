//! Handler functions for project and page management.
//!
//! Every handler resolves the project through `load_project`, so a project
//! owned by another tenant is indistinguishable from a missing one.

use super::models::{
    CreatePageRequest, CreateProjectRequest, ImageVersionView, ListProjectsQuery, PageView,
    ProjectView, UpdateDescriptionRequest, UpdateOutlineRequest, UpdateProjectRequest,
};
use crate::api::load_project;
use crate::auth::AuthContext;
use crate::database::models::{CreationType, Page, PageDescription, PageStatus, Project};
use crate::database::queries::{self, NewPage};
use crate::database::DbResult;
use crate::errors::{ApiJson, ApiResponse, AppError, AppResult};
use crate::utils::non_blank;
use crate::AppState;
use axum::extract::{Path, Query, State};
use serde_json::{json, Value};
use tracing::{info, warn};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 100;

fn internal(err: serde_json::Error) -> AppError {
    AppError::Internal(err.to_string())
}

async fn project_view(state: &AppState, project: Project) -> AppResult<ProjectView> {
    let id = project.id.clone();
    let pages = state
        .db
        .call(move |conn| queries::list_pages(conn, &id))
        .await?;
    Ok(ProjectView::new(&project, &pages))
}

async fn load_page(state: &AppState, project_id: &str, page_id: &str) -> AppResult<Page> {
    let (project_id, page_id) = (project_id.to_string(), page_id.to_string());
    state
        .db
        .call(move |conn| queries::get_page(conn, &project_id, &page_id))
        .await?
        .ok_or_else(|| AppError::not_found("Page not found"))
}

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(body): ApiJson<CreateProjectRequest>,
) -> AppResult<ApiResponse<ProjectView>> {
    let creation_type = body.creation_type.unwrap_or(CreationType::Idea);
    let mut project = Project::new(creation_type, auth.tenant());
    project.idea_prompt = non_blank(body.idea_prompt.as_deref());
    project.outline_text = non_blank(body.outline_text.as_deref());
    project.description_text = non_blank(body.description_text.as_deref());
    project.template_style = non_blank(body.template_style.as_deref());

    let missing = match creation_type {
        CreationType::Idea if project.idea_prompt.is_none() => Some("idea_prompt"),
        CreationType::Outline if project.outline_text.is_none() => Some("outline_text"),
        CreationType::Descriptions if project.description_text.is_none() => {
            Some("description_text")
        }
        _ => None,
    };
    if let Some(field) = missing {
        return Err(AppError::bad_request(format!(
            "{field} is required for {creation_type} projects"
        )));
    }

    let row = project.clone();
    state
        .db
        .call(move |conn| queries::insert_project(conn, &row))
        .await?;
    info!(project_id = %project.id, %creation_type, "Project created");
    Ok(ApiResponse::created(ProjectView::new(&project, &[])))
}

/// `GET /api/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListProjectsQuery>,
) -> AppResult<ApiResponse<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let tenant = auth.tenant();
    let projects = state
        .db
        .call(move |conn| {
            let projects = queries::list_projects(conn, tenant.as_deref(), limit, offset)?;
            projects
                .into_iter()
                .map(|project| {
                    let pages = queries::list_pages(conn, &project.id)?;
                    Ok(ProjectView::new(&project, &pages))
                })
                .collect::<DbResult<Vec<_>>>()
        })
        .await?;
    Ok(ApiResponse::ok(json!({ "projects": projects })))
}

/// `GET /api/projects/:project_id`
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
) -> AppResult<ApiResponse<ProjectView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    Ok(ApiResponse::ok(project_view(&state, project).await?))
}

/// `PUT /api/projects/:project_id`
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<UpdateProjectRequest>,
) -> AppResult<ApiResponse<ProjectView>> {
    let mut project = load_project(&state, &auth, &project_id).await?;
    if let Some(idea) = body.idea_prompt {
        project.idea_prompt = non_blank(idea.as_deref());
    }
    if let Some(extra) = body.extra_requirements {
        project.extra_requirements = non_blank(extra.as_deref());
    }
    if let Some(style) = body.template_style {
        project.template_style = non_blank(style.as_deref());
    }

    let row = project.clone();
    let order = body.pages_order;
    let reordered = state
        .db
        .call(move |conn| {
            if let Some(order) = &order {
                if !queries::reorder_pages(conn, &row.id, order)? {
                    return Ok(false);
                }
            }
            queries::update_project(conn, &row)?;
            Ok(true)
        })
        .await?;
    if !reordered {
        return Err(AppError::bad_request(
            "pages_order must list every page of the project exactly once",
        ));
    }

    let project = load_project(&state, &auth, &project_id).await?;
    Ok(ApiResponse::ok(project_view(&state, project).await?))
}

/// `DELETE /api/projects/:project_id`
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let id = project.id.clone();
    state
        .db
        .call(move |conn| queries::delete_project(conn, &id))
        .await?;
    if let Err(err) = state.files.delete_project_files(&project.id).await {
        warn!(project_id = %project.id, "Project deleted but its files were not removed: {err}");
    }
    info!(project_id = %project.id, "Project deleted");
    Ok(ApiResponse::ok(json!({ "id": project.id })).with_message("Project deleted"))
}

/// `POST /api/projects/:project_id/pages`
pub async fn create_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    ApiJson(body): ApiJson<CreatePageRequest>,
) -> AppResult<ApiResponse<PageView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let new_page = NewPage {
        part: non_blank(body.part.as_deref()),
        outline_content: body
            .outline_content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(internal)?,
        ..NewPage::default()
    };
    let order_index = body.order_index;
    let page = state
        .db
        .call(move |conn| {
            let page = queries::insert_page_at(conn, &project.id, order_index, new_page)?;
            queries::touch_project(conn, &project.id)?;
            Ok(page)
        })
        .await?;
    Ok(ApiResponse::created(PageView::from(&page)))
}

/// `PUT /api/projects/:project_id/pages/:page_id/outline`
pub async fn update_page_outline(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateOutlineRequest>,
) -> AppResult<ApiResponse<PageView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let mut page = load_page(&state, &project.id, &page_id).await?;
    page.set_outline(&body.outline_content).map_err(internal)?;
    if let Some(part) = body.part {
        page.part = non_blank(part.as_deref());
    }
    save_page(&state, page).await
}

/// `PUT /api/projects/:project_id/pages/:page_id/description`
pub async fn update_page_description(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateDescriptionRequest>,
) -> AppResult<ApiResponse<PageView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let mut page = load_page(&state, &project.id, &page_id).await?;
    let text = match body.description_content {
        Value::String(text) => text,
        value => {
            serde_json::from_value::<PageDescription>(value)
                .map_err(|_| AppError::bad_request("description_content must contain a text field"))?
                .text
        }
    };
    page.set_description(&text).map_err(internal)?;
    if page.status == PageStatus::Draft {
        page.status = PageStatus::DescriptionGenerated;
    }
    save_page(&state, page).await
}

async fn save_page(state: &AppState, page: Page) -> AppResult<ApiResponse<PageView>> {
    let row = page.clone();
    state
        .db
        .call(move |conn| {
            queries::update_page(conn, &row)?;
            queries::touch_project(conn, &row.project_id)
        })
        .await?;
    let page = load_page(state, &page.project_id, &page.id).await?;
    Ok(ApiResponse::ok(PageView::from(&page)))
}

/// `DELETE /api/projects/:project_id/pages/:page_id`
pub async fn delete_page(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let (id, page) = (project.id.clone(), page_id.clone());
    let removed = state
        .db
        .call(move |conn| {
            let removed = queries::delete_page(conn, &id, &page)?;
            if removed {
                queries::touch_project(conn, &id)?;
            }
            Ok(removed)
        })
        .await?;
    if !removed {
        return Err(AppError::not_found("Page not found"));
    }
    if let Err(err) = state.files.delete_page_images(&project.id, &page_id).await {
        warn!(page_id = %page_id, "Page deleted but its images were not removed: {err}");
    }
    Ok(ApiResponse::ok(json!({ "id": page_id })).with_message("Page deleted"))
}

/// `GET /api/projects/:project_id/pages/:page_id/image-versions`
pub async fn list_image_versions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<Value>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let page = load_page(&state, &project.id, &page_id).await?;
    let versions = state
        .db
        .call(move |conn| queries::list_image_versions(conn, &page.id))
        .await?;
    let versions: Vec<ImageVersionView> = versions.iter().map(ImageVersionView::from).collect();
    Ok(ApiResponse::ok(json!({ "versions": versions })))
}

/// `POST /api/projects/:project_id/pages/:page_id/image-versions/:version_id/set-current`
pub async fn set_current_image_version(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, page_id, version_id)): Path<(String, String, String)>,
) -> AppResult<ApiResponse<PageView>> {
    let project = load_project(&state, &auth, &project_id).await?;
    let page = load_page(&state, &project.id, &page_id).await?;
    let id = page.id.clone();
    state
        .db
        .call(move |conn| queries::set_current_version(conn, &id, &version_id))
        .await?
        .ok_or_else(|| AppError::not_found("Image version not found"))?;

    let page = load_page(&state, &project.id, &page.id).await?;
    let id = page.id.clone();
    let versions = state
        .db
        .call(move |conn| queries::list_image_versions(conn, &id))
        .await?;
    Ok(ApiResponse::ok(PageView::from(&page).with_versions(&versions)))
}
