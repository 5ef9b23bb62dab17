//! Rust structs that represent database table mappings.
//!
//! Each model knows how to build itself from a `rusqlite::Row`. Status and
//! type columns are stored as text and mapped to enums here. API-facing views
//! (page URLs, hidden secrets) are built on top of these in the handlers.

use crate::config::Config;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a text-backed enum with serde, `FromStr` and SQLite conversions.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($name))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: String| FromSqlError::Other(err.into()))
            }
        }
    };
}

text_enum!(CreationType {
    Idea => "idea",
    Outline => "outline",
    Descriptions => "descriptions",
});

text_enum!(ProjectStatus {
    Draft => "DRAFT",
    OutlineGenerated => "OUTLINE_GENERATED",
    DescriptionsGenerated => "DESCRIPTIONS_GENERATED",
    GeneratingImages => "GENERATING_IMAGES",
    Completed => "COMPLETED",
});

text_enum!(PageStatus {
    Draft => "DRAFT",
    DescriptionGenerated => "DESCRIPTION_GENERATED",
    Generating => "GENERATING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

text_enum!(TaskType {
    GenerateDescriptions => "GENERATE_DESCRIPTIONS",
    GenerateImages => "GENERATE_IMAGES",
    EditImage => "EDIT_IMAGE",
});

text_enum!(TaskStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            display_name: row.get("display_name")?,
            avatar_url: row.get("avatar_url")?,
            created_at: row.get("created_at")?,
            last_login_at: row.get("last_login_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub user_id: Option<String>,
    pub creation_type: CreationType,
    pub idea_prompt: Option<String>,
    pub outline_text: Option<String>,
    pub description_text: Option<String>,
    pub extra_requirements: Option<String>,
    pub template_style: Option<String>,
    pub template_image_path: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// A new `DRAFT` project.
    pub fn new(creation_type: CreationType, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::utils::new_id(),
            user_id,
            creation_type,
            idea_prompt: None,
            outline_text: None,
            description_text: None,
            extra_requirements: None,
            template_style: None,
            template_image_path: None,
            status: ProjectStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            creation_type: row.get("creation_type")?,
            idea_prompt: row.get("idea_prompt")?,
            outline_text: row.get("outline_text")?,
            description_text: row.get("description_text")?,
            extra_requirements: row.get("extra_requirements")?,
            template_style: row.get("template_style")?,
            template_image_path: row.get("template_image_path")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Structured outline of one page, stored as JSON in `pages.outline_content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOutline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
}

/// Generated description of one page, stored as JSON in `pages.description_content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: String,
    pub project_id: String,
    pub order_index: i64,
    pub part: Option<String>,
    /// Raw JSON text.
    pub outline_content: Option<String>,
    /// Raw JSON text.
    pub description_content: Option<String>,
    pub generated_image_path: Option<String>,
    pub cached_image_path: Option<String>,
    pub status: PageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            order_index: row.get("order_index")?,
            part: row.get("part")?,
            outline_content: row.get("outline_content")?,
            description_content: row.get("description_content")?,
            generated_image_path: row.get("generated_image_path")?,
            cached_image_path: row.get("cached_image_path")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn outline(&self) -> Option<PageOutline> {
        self.outline_content
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn description(&self) -> Option<PageDescription> {
        self.description_content
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Description text, if the page has a non-empty one.
    pub fn description_text(&self) -> Option<String> {
        self.description()
            .map(|description| description.text)
            .filter(|text| !text.trim().is_empty())
    }

    pub fn set_outline(&mut self, outline: &PageOutline) -> serde_json::Result<()> {
        self.outline_content = Some(serde_json::to_string(outline)?);
        Ok(())
    }

    pub fn set_description(&mut self, text: &str) -> serde_json::Result<()> {
        let description = PageDescription {
            text: text.to_string(),
        };
        self.description_content = Some(serde_json::to_string(&description)?);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageImageVersion {
    pub id: String,
    pub page_id: String,
    pub image_path: String,
    pub cached_image_path: Option<String>,
    pub version_number: i64,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

impl PageImageVersion {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            page_id: row.get("page_id")?,
            image_path: row.get("image_path")?,
            cached_image_path: row.get("cached_image_path")?,
            version_number: row.get("version_number")?,
            is_current: row.get("is_current")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
}

impl TaskProgress {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed + self.failed >= self.total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let progress: String = row.get("progress")?;
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            task_type: row.get("task_type")?,
            status: row.get("status")?,
            progress: serde_json::from_str(&progress).unwrap_or_default(),
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTemplate {
    pub id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub file_path: String,
    pub thumb_path: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserTemplate {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            file_path: row.get("file_path")?,
            thumb_path: row.get("thumb_path")?,
            file_size: row.get("file_size")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: String,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub filename: String,
    pub relative_path: String,
    pub created_at: DateTime<Utc>,
}

impl Material {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            user_id: row.get("user_id")?,
            filename: row.get("filename")?,
            relative_path: row.get("relative_path")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AllowedEmail {
    pub id: i64,
    pub email: String,
    pub added_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AllowedEmail {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            added_by: row.get("added_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub const DEFAULT_THINKING_BUDGET: u32 = 1024;

/// Singleton application settings (row id 1). Secrets never leave the
/// backend; see [`Settings::view`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ai_provider_format: String,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub image_resolution: String,
    pub image_aspect_ratio: String,
    pub max_description_workers: u32,
    pub max_image_workers: u32,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub image_caption_model: Option<String>,
    pub mineru_api_base: Option<String>,
    pub mineru_token: Option<String>,
    pub baidu_ocr_api_key: Option<String>,
    pub output_language: String,
    pub enable_text_reasoning: bool,
    pub text_thinking_budget: u32,
    pub enable_image_reasoning: bool,
    pub image_thinking_budget: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Defaults derived from the environment configuration.
    pub fn from_config(config: &Config) -> Self {
        let (api_base_url, api_key) = config.default_api_credentials();
        let now = Utc::now();
        Self {
            ai_provider_format: config.ai_provider_format.as_str().to_string(),
            api_base_url,
            api_key,
            image_resolution: config.default_resolution.clone(),
            image_aspect_ratio: config.default_aspect_ratio.clone(),
            max_description_workers: config.max_description_workers,
            max_image_workers: config.max_image_workers,
            text_model: Some(config.text_model.clone()),
            image_model: Some(config.image_model.clone()),
            image_caption_model: Some(config.image_caption_model.clone()),
            mineru_api_base: Some(config.mineru_api_base.clone()).filter(|v| !v.is_empty()),
            mineru_token: Some(config.mineru_token.clone()).filter(|v| !v.is_empty()),
            baidu_ocr_api_key: Some(config.baidu_ocr_api_key.clone()).filter(|v| !v.is_empty()),
            output_language: config.output_language.clone(),
            enable_text_reasoning: false,
            text_thinking_budget: DEFAULT_THINKING_BUDGET,
            enable_image_reasoning: false,
            image_thinking_budget: DEFAULT_THINKING_BUDGET,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ai_provider_format: row.get("ai_provider_format")?,
            api_base_url: row.get("api_base_url")?,
            api_key: row.get("api_key")?,
            image_resolution: row.get("image_resolution")?,
            image_aspect_ratio: row.get("image_aspect_ratio")?,
            max_description_workers: row.get("max_description_workers")?,
            max_image_workers: row.get("max_image_workers")?,
            text_model: row.get("text_model")?,
            image_model: row.get("image_model")?,
            image_caption_model: row.get("image_caption_model")?,
            mineru_api_base: row.get("mineru_api_base")?,
            mineru_token: row.get("mineru_token")?,
            baidu_ocr_api_key: row.get("baidu_ocr_api_key")?,
            output_language: row.get("output_language")?,
            enable_text_reasoning: row.get("enable_text_reasoning")?,
            text_thinking_budget: row.get("text_thinking_budget")?,
            enable_image_reasoning: row.get("enable_image_reasoning")?,
            image_thinking_budget: row.get("image_thinking_budget")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Text thinking budget actually sent to providers (0 when reasoning is off).
    pub fn effective_text_budget(&self) -> u32 {
        if self.enable_text_reasoning {
            self.text_thinking_budget
        } else {
            0
        }
    }

    pub fn effective_image_budget(&self) -> u32 {
        if self.enable_image_reasoning {
            self.image_thinking_budget
        } else {
            0
        }
    }

    pub fn view(&self) -> SettingsView {
        let secret_len = |value: &Option<String>| value.as_deref().map_or(0, |v| v.chars().count());
        SettingsView {
            id: 1,
            ai_provider_format: self.ai_provider_format.clone(),
            api_base_url: self.api_base_url.clone(),
            api_key_length: secret_len(&self.api_key),
            image_resolution: self.image_resolution.clone(),
            image_aspect_ratio: self.image_aspect_ratio.clone(),
            max_description_workers: self.max_description_workers,
            max_image_workers: self.max_image_workers,
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            image_caption_model: self.image_caption_model.clone(),
            mineru_api_base: self.mineru_api_base.clone(),
            mineru_token_length: secret_len(&self.mineru_token),
            baidu_ocr_api_key_length: secret_len(&self.baidu_ocr_api_key),
            output_language: self.output_language.clone(),
            enable_text_reasoning: self.enable_text_reasoning,
            text_thinking_budget: self.text_thinking_budget,
            enable_image_reasoning: self.enable_image_reasoning,
            image_thinking_budget: self.image_thinking_budget,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Settings as returned by the API: secrets are replaced by their lengths.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub id: i64,
    pub ai_provider_format: String,
    pub api_base_url: Option<String>,
    pub api_key_length: usize,
    pub image_resolution: String,
    pub image_aspect_ratio: String,
    pub max_description_workers: u32,
    pub max_image_workers: u32,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub image_caption_model: Option<String>,
    pub mineru_api_base: Option<String>,
    pub mineru_token_length: usize,
    pub baidu_ocr_api_key_length: usize,
    pub output_language: String,
    pub enable_text_reasoning: bool,
    pub text_thinking_budget: u32,
    pub enable_image_reasoning: bool,
    pub image_thinking_budget: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
