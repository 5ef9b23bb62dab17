//! Handler functions for listing, generating and deleting materials.

use crate::api::load_project;
use crate::auth::AuthContext;
use crate::database::models::Material;
use crate::database::queries::{self, MaterialScope};
use crate::errors::{ApiJson, ApiResponse, AppError, AppResult};
use crate::services::settings as settings_service;
use crate::utils::{file_url, new_id, non_blank, now};
use crate::AppState;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ListMaterialsQuery {
    pub project_id: Option<String>,
}

impl ListMaterialsQuery {
    /// `none` selects global materials, `all` (the default) everything.
    pub fn scope(&self) -> MaterialScope {
        match self.project_id.as_deref().map(str::trim) {
            None | Some("") | Some("all") => MaterialScope::All,
            Some("none") => MaterialScope::Global,
            Some(id) => MaterialScope::Project(id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateMaterialRequest {
    #[serde(default)]
    pub prompt: String,
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MaterialView {
    pub id: String,
    pub project_id: Option<String>,
    pub filename: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Material> for MaterialView {
    fn from(material: &Material) -> Self {
        Self {
            id: material.id.clone(),
            project_id: material.project_id.clone(),
            filename: material.filename.clone(),
            url: file_url(&material.relative_path),
            created_at: material.created_at,
        }
    }
}

/// `GET /api/materials`
pub async fn list_materials(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListMaterialsQuery>,
) -> AppResult<ApiResponse<Value>> {
    let scope = query.scope();
    let tenant = auth.tenant();
    let materials = state
        .db
        .call(move |conn| queries::list_materials(conn, tenant.as_deref(), &scope))
        .await?;
    let materials: Vec<MaterialView> = materials.iter().map(MaterialView::from).collect();
    Ok(ApiResponse::ok(json!({ "materials": materials })))
}

/// `POST /api/materials/generate`
pub async fn generate_material(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(body): ApiJson<GenerateMaterialRequest>,
) -> AppResult<ApiResponse<MaterialView>> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::bad_request("prompt is required"));
    }
    let project_id = match non_blank(body.project_id.as_deref()) {
        Some(id) if id != "none" => Some(load_project(&state, &auth, &id).await?.id),
        _ => None,
    };

    let settings = settings_service::load(&state.db, &state.config).await?;
    let ai = state.ai.service(&settings).await?;
    let generated = ai.generate_material_image(prompt).await?;
    let image = image::load_from_memory(&generated.bytes)?;
    let (filename, relative_path) = state
        .files
        .save_material_image(project_id.as_deref(), image)
        .await?;

    let material = Material {
        id: new_id(),
        project_id,
        user_id: auth.tenant(),
        filename,
        relative_path,
        created_at: now(),
    };
    let row = material.clone();
    state
        .db
        .call(move |conn| queries::insert_material(conn, &row))
        .await?;
    info!(material_id = %material.id, "Material generated");
    Ok(ApiResponse::created(MaterialView::from(&material)))
}

/// `DELETE /api/materials/:material_id`
pub async fn delete_material(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(material_id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    let tenant = auth.tenant();
    let material = state
        .db
        .call(move |conn| {
            let Some(material) = queries::get_material(conn, &material_id, tenant.as_deref())? else {
                return Ok(None);
            };
            queries::delete_material(conn, &material.id)?;
            Ok(Some(material))
        })
        .await?
        .ok_or_else(|| AppError::not_found("Material not found"))?;
    state.files.delete_file(&material.relative_path).await?;
    Ok(ApiResponse::ok(json!({ "id": material.id })).with_message("Material deleted"))
}
