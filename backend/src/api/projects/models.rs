//! Request bodies and response views for projects and pages.
//!
//! Views turn stored relative paths into `/files` URLs and parse the page
//! JSON columns so clients receive structured content.

use crate::database::models::{
    CreationType, Page, PageImageVersion, PageOutline, PageStatus, Project, ProjectStatus,
};
use crate::utils::{deserialize_some, file_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub creation_type: Option<CreationType>,
    pub idea_prompt: Option<String>,
    pub outline_text: Option<String>,
    pub description_text: Option<String>,
    pub template_style: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProjectRequest {
    #[serde(deserialize_with = "deserialize_some")]
    pub idea_prompt: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub extra_requirements: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub template_style: Option<Option<String>>,
    pub pages_order: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreatePageRequest {
    pub order_index: Option<i64>,
    pub part: Option<String>,
    pub outline_content: Option<PageOutline>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOutlineRequest {
    pub outline_content: PageOutline,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub part: Option<Option<String>>,
}

/// `description_content` is either `{"text": ...}` or a bare string.
#[derive(Debug, Deserialize)]
pub struct UpdateDescriptionRequest {
    pub description_content: Value,
}

#[derive(Debug, Serialize)]
pub struct ImageVersionView {
    pub id: String,
    pub page_id: String,
    pub version_number: i64,
    pub is_current: bool,
    pub image_url: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&PageImageVersion> for ImageVersionView {
    fn from(version: &PageImageVersion) -> Self {
        Self {
            id: version.id.clone(),
            page_id: version.page_id.clone(),
            version_number: version.version_number,
            is_current: version.is_current,
            image_url: file_url(&version.image_path),
            thumbnail_url: version.cached_image_path.as_deref().map(file_url),
            created_at: version.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageView {
    pub id: String,
    pub project_id: String,
    pub order_index: i64,
    pub part: Option<String>,
    pub outline_content: Option<Value>,
    pub description_content: Option<Value>,
    pub generated_image_url: Option<String>,
    pub status: PageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_versions: Option<Vec<ImageVersionView>>,
}

fn parse_json(raw: Option<&str>) -> Option<Value> {
    raw.and_then(|text| serde_json::from_str(text).ok())
}

impl From<&Page> for PageView {
    fn from(page: &Page) -> Self {
        let image = page
            .cached_image_path
            .as_deref()
            .or(page.generated_image_path.as_deref());
        Self {
            id: page.id.clone(),
            project_id: page.project_id.clone(),
            order_index: page.order_index,
            part: page.part.clone(),
            outline_content: parse_json(page.outline_content.as_deref()),
            description_content: parse_json(page.description_content.as_deref()),
            generated_image_url: image.map(file_url),
            status: page.status,
            created_at: page.created_at,
            updated_at: page.updated_at,
            image_versions: None,
        }
    }
}

impl PageView {
    pub fn with_versions(mut self, versions: &[PageImageVersion]) -> Self {
        self.image_versions = Some(versions.iter().map(ImageVersionView::from).collect());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub id: String,
    pub creation_type: CreationType,
    pub idea_prompt: Option<String>,
    pub outline_text: Option<String>,
    pub description_text: Option<String>,
    pub extra_requirements: Option<String>,
    pub template_style: Option<String>,
    pub template_image_url: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pages: Vec<PageView>,
}

impl ProjectView {
    pub fn new(project: &Project, pages: &[Page]) -> Self {
        Self {
            id: project.id.clone(),
            creation_type: project.creation_type,
            idea_prompt: project.idea_prompt.clone(),
            outline_text: project.outline_text.clone(),
            description_text: project.description_text.clone(),
            extra_requirements: project.extra_requirements.clone(),
            template_style: project.template_style.clone(),
            template_image_url: project.template_image_path.as_deref().map(file_url),
            status: project.status,
            created_at: project.created_at,
            updated_at: project.updated_at,
            pages: pages.iter().map(PageView::from).collect(),
        }
    }
}
