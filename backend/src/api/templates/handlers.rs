//! Handler functions for template uploads and the user template library.

use super::models::{TemplateUpload, UserTemplateView};
use crate::api::load_project;
use crate::auth::AuthContext;
use crate::database::models::UserTemplate;
use crate::database::queries;
use crate::errors::{ApiResponse, AppError, AppResult};
use crate::utils::{file_url, new_id, now};
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use serde_json::{json, Value};
use tracing::info;

/// `POST /api/projects/:project_id/template`
pub async fn upload_template(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<Value>> {
    let mut project = load_project(&state, &auth, &project_id).await?;
    let upload = TemplateUpload::from_multipart(multipart).await?;
    let path = state
        .files
        .save_template_image(&project.id, &upload.extension, &upload.bytes)
        .await?;

    project.template_image_path = Some(path.clone());
    state
        .db
        .call(move |conn| queries::update_project(conn, &project))
        .await?;
    info!(project_id = %project_id, file = %upload.filename, "Template uploaded");
    Ok(ApiResponse::ok(json!({ "template_image_url": file_url(&path) })))
}

/// `DELETE /api/projects/:project_id/template`
pub async fn delete_template(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let mut project = load_project(&state, &auth, &project_id).await?;
    if project.template_image_path.is_none() {
        return Err(AppError::bad_request("No template to delete"));
    }
    state.files.delete_template(&project.id).await?;
    project.template_image_path = None;
    state
        .db
        .call(move |conn| queries::update_project(conn, &project))
        .await?;
    Ok(ApiResponse::ok(Value::Null).with_message("Template deleted successfully"))
}

/// `GET /api/templates`
///
/// No presets ship with the server; clients bundle their own.
pub async fn list_system_templates() -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "templates": [] }))
}

/// `POST /api/user-templates`
pub async fn upload_user_template(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> AppResult<ApiResponse<UserTemplateView>> {
    let upload = TemplateUpload::from_multipart(multipart).await?;
    let id = new_id();
    let file_size = i64::try_from(upload.bytes.len()).ok();
    let (file_path, thumb_path) = state
        .files
        .save_user_template(&id, &upload.extension, upload.bytes)
        .await?;

    let timestamp = now();
    let template = UserTemplate {
        id,
        user_id: auth.tenant(),
        name: upload.name,
        file_path,
        thumb_path,
        file_size,
        created_at: timestamp,
        updated_at: timestamp,
    };
    let row = template.clone();
    state
        .db
        .call(move |conn| queries::insert_user_template(conn, &row))
        .await?;
    info!(template_id = %template.id, "User template uploaded");
    Ok(ApiResponse::ok(UserTemplateView::from(&template)))
}

/// `GET /api/user-templates`
pub async fn list_user_templates(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<ApiResponse<Value>> {
    let tenant = auth.tenant();
    let templates = state
        .db
        .call(move |conn| queries::list_user_templates(conn, tenant.as_deref()))
        .await?;
    let templates: Vec<UserTemplateView> = templates.iter().map(UserTemplateView::from).collect();
    Ok(ApiResponse::ok(json!({ "templates": templates })))
}

/// `DELETE /api/user-templates/:template_id`
pub async fn delete_user_template(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(template_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let tenant = auth.tenant();
    let id = template_id.clone();
    let removed = state
        .db
        .call(move |conn| {
            if queries::get_user_template(conn, &id, tenant.as_deref())?.is_none() {
                return Ok(false);
            }
            queries::delete_user_template(conn, &id)
        })
        .await?;
    if !removed {
        return Err(AppError::not_found("Template not found"));
    }
    state.files.delete_user_template(&template_id).await?;
    Ok(ApiResponse::ok(Value::Null).with_message("Template deleted successfully"))
}
