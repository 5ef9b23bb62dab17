//! Multipart upload parsing and user template views.

use crate::database::models::UserTemplate;
use crate::errors::{AppError, AppResult};
use crate::services::file_service::{allowed_file, secure_filename};
use crate::utils::{file_url, non_blank};
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const TEMPLATE_FIELD: &str = "template_image";

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(err.body_text())
}

/// An accepted image upload.
#[derive(Debug)]
pub struct TemplateUpload {
    pub filename: String,
    pub extension: String,
    pub bytes: Vec<u8>,
    pub name: Option<String>,
}

impl TemplateUpload {
    /// Reads the `template_image` file and the optional `name` text field.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut file: Option<(String, Vec<u8>)> = None;
        let mut name = None;
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            match field.name() {
                Some(TEMPLATE_FIELD) => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    file = Some((filename, bytes.to_vec()));
                }
                Some("name") => {
                    let text = field.text().await.map_err(multipart_error)?;
                    name = non_blank(Some(&text));
                }
                _ => {}
            }
        }

        let (filename, bytes) = file.ok_or_else(|| AppError::bad_request("No file uploaded"))?;
        if filename.trim().is_empty() {
            return Err(AppError::bad_request("No file selected"));
        }
        let extension = allowed_file(&filename).ok_or_else(|| {
            AppError::bad_request("Invalid file type. Allowed types: png, jpg, jpeg, gif, webp")
        })?;
        Ok(Self {
            filename: secure_filename(&filename),
            extension,
            bytes,
            name,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserTemplateView {
    pub id: String,
    pub name: Option<String>,
    pub template_image_url: String,
    pub thumb_url: Option<String>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserTemplate> for UserTemplateView {
    fn from(template: &UserTemplate) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            template_image_url: file_url(&template.file_path),
            thumb_url: template.thumb_path.as_deref().map(file_url),
            file_size: template.file_size,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}
