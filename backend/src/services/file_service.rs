//! Storage of uploaded and generated files under the upload folder.
//!
//! Layout (relative to the upload folder):
//! - `{project}/template/template.{ext}`
//! - `{project}/pages/{page}_v{n}.png` and `{page}_v{n}_thumb.jpg`
//! - `{project}/materials/material_{ms}.png`, or `materials/...` when global
//! - `user-templates/{id}/template.{ext}` and `template-thumb.webp`
//!
//! Paths stored in the database are always relative and use `/`.

use crate::config::ALLOWED_IMAGE_EXTENSIONS;
use crate::errors::{AppError, AppResult};
use adapters::ReferenceImage;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const THUMBNAIL_QUALITY: u8 = 85;
pub const THUMBNAIL_MAX_WIDTH: u32 = 1920;
pub const TEMPLATE_THUMB_MAX_WIDTH: u32 = 600;

pub struct FileService {
    upload_folder: PathBuf,
}

/// Relative path of the PNG original for a page image version.
pub fn page_image_path(project_id: &str, page_id: &str, version_number: i64) -> String {
    format!("{project_id}/pages/{page_id}_v{version_number}.png")
}

/// Files written for one generated page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub image_path: String,
    pub cached_image_path: Option<String>,
}

impl FileService {
    pub fn new(upload_folder: impl Into<PathBuf>) -> Self {
        Self {
            upload_folder: upload_folder.into(),
        }
    }

    pub fn upload_folder(&self) -> &Path {
        &self.upload_folder
    }

    /// Absolute path for a stored relative path. Returns `None` for paths
    /// that would escape the upload folder.
    pub fn absolute(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative.trim_start_matches(['/', '\\']));
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        safe.then(|| self.upload_folder.join(relative))
    }

    /// Resolves a `/files/...` URL to an existing file.
    pub fn resolve_files_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix("/files/")?;
        let path = self.absolute(relative)?;
        path.is_file().then_some(path)
    }

    async fn write(&self, relative: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self
            .absolute(relative)
            .ok_or_else(|| AppError::bad_request("Invalid file path"))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = relative, size = bytes.len(), "Wrote file");
        Ok(())
    }

    /// Replaces the project's template image.
    pub async fn save_template_image(&self, project_id: &str, ext: &str, bytes: &[u8]) -> AppResult<String> {
        self.delete_template(project_id).await?;
        let relative = format!("{project_id}/template/template.{ext}");
        self.write(&relative, bytes).await?;
        Ok(relative)
    }

    pub async fn delete_template(&self, project_id: &str) -> AppResult<()> {
        self.remove_dir(&format!("{project_id}/template")).await
    }

    /// Writes the PNG original and its JPEG thumbnail. A thumbnail failure
    /// is logged and leaves `cached_image_path` empty.
    pub async fn save_generated_image(
        &self,
        project_id: &str,
        page_id: &str,
        version_number: i64,
        image: DynamicImage,
    ) -> AppResult<SavedImage> {
        let (png, thumb) = tokio::task::spawn_blocking(move || {
            let png = encode_png(&image)?;
            let thumb = encode_jpeg_thumbnail(&image, THUMBNAIL_MAX_WIDTH, THUMBNAIL_QUALITY);
            Ok::<_, image::ImageError>((png, thumb))
        })
        .await
        .map_err(|err| AppError::Internal(err.to_string()))??;

        let image_path = page_image_path(project_id, page_id, version_number);
        self.write(&image_path, &png).await?;

        let cached_image_path = match thumb {
            Ok(bytes) => {
                let path = format!("{project_id}/pages/{page_id}_v{version_number}_thumb.jpg");
                self.write(&path, &bytes).await?;
                Some(path)
            }
            Err(err) => {
                warn!(page_id, "Failed to build thumbnail: {err}");
                None
            }
        };

        Ok(SavedImage {
            image_path,
            cached_image_path,
        })
    }

    /// Removes every stored version of a page image (originals and thumbnails).
    pub async fn delete_page_images(&self, project_id: &str, page_id: &str) -> AppResult<()> {
        let Some(dir) = self.absolute(&format!("{project_id}/pages")) else {
            return Ok(());
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let prefix = format!("{page_id}_v");
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    pub async fn save_material_image(&self, project_id: Option<&str>, image: DynamicImage) -> AppResult<(String, String)> {
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|err| AppError::Internal(err.to_string()))??;
        let filename = format!("material_{}.png", Utc::now().timestamp_millis());
        let relative = match project_id {
            Some(project_id) => format!("{project_id}/materials/{filename}"),
            None => format!("materials/{filename}"),
        };
        self.write(&relative, &png).await?;
        Ok((filename, relative))
    }

    /// Saves a user template and its WebP thumbnail. The thumbnail is
    /// best-effort: on failure it is `None`.
    pub async fn save_user_template(
        &self,
        template_id: &str,
        ext: &str,
        bytes: Vec<u8>,
    ) -> AppResult<(String, Option<String>)> {
        let relative = format!("user-templates/{template_id}/template.{ext}");
        self.write(&relative, &bytes).await?;

        let thumb = tokio::task::spawn_blocking(move || {
            let image = image::load_from_memory(&bytes)?;
            encode_webp_thumbnail(&image, TEMPLATE_THUMB_MAX_WIDTH)
        })
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?;

        let thumb_path = match thumb {
            Ok(thumb) => {
                let path = format!("user-templates/{template_id}/template-thumb.webp");
                self.write(&path, &thumb).await?;
                Some(path)
            }
            Err(err) => {
                warn!(template_id, "Failed to build template thumbnail: {err}");
                None
            }
        };
        Ok((relative, thumb_path))
    }

    pub async fn delete_user_template(&self, template_id: &str) -> AppResult<()> {
        self.remove_dir(&format!("user-templates/{template_id}")).await
    }

    pub async fn delete_project_files(&self, project_id: &str) -> AppResult<()> {
        self.remove_dir(project_id).await
    }

    /// Deletes one file; a missing file is not an error.
    pub async fn delete_file(&self, relative: &str) -> AppResult<()> {
        let Some(path) = self.absolute(relative) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    async fn remove_dir(&self, relative: &str) -> AppResult<()> {
        let Some(path) = self.absolute(relative) else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(&path).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Reads an image file for use as a provider reference.
    pub async fn load_reference_image(&self, path: &Path) -> AppResult<ReferenceImage> {
        let bytes = tokio::fs::read(path).await?;
        reference_from_bytes(bytes)
    }
}

/// Wraps encoded image bytes for a provider, re-encoding formats that
/// providers may not accept as PNG.
pub fn reference_from_bytes(bytes: Vec<u8>) -> AppResult<ReferenceImage> {
    let format = image::guess_format(&bytes)?;
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        _ => {
            let image = image::load_from_memory(&bytes)?;
            return Ok(ReferenceImage::new(encode_png(&image)?, "image/png"));
        }
    };
    Ok(ReferenceImage::new(bytes, mime))
}

/// Lower-cased extension of an allowed image upload, or `None`.
pub fn allowed_file(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
    ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; other runs become `_`.
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut cleaned = String::with_capacity(base.len());
    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            cleaned.push(ch);
        } else if !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }
    cleaned.trim_matches(['.', '_']).to_string()
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn shrink_to_width(image: &DynamicImage, max_width: u32) -> DynamicImage {
    if image.width() > max_width {
        image.resize(max_width, image.height(), FilterType::Lanczos3)
    } else {
        image.clone()
    }
}

/// Drops alpha by compositing onto a white background.
fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |channel: u8| ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}

pub fn encode_jpeg_thumbnail(
    image: &DynamicImage,
    max_width: u32,
    quality: u8,
) -> Result<Vec<u8>, image::ImageError> {
    let rgb = flatten_on_white(&shrink_to_width(image, max_width));
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}

pub fn encode_webp_thumbnail(image: &DynamicImage, max_width: u32) -> Result<Vec<u8>, image::ImageError> {
    let rgba = shrink_to_width(image, max_width).to_rgba8();
    let mut buffer = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?;
    Ok(buffer)
}
