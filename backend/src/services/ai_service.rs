//! AI service: every model interaction the backend performs.
//!
//! Wraps a text and an image provider with the generation options taken
//! from the persisted settings (language, reasoning budgets, aspect ratio,
//! resolution) and implements outline, description and slide-image
//! generation on top of them.

use super::file_service::{encode_png, reference_from_bytes, FileService};
use super::prompts::{self, ImagePromptInput};
use crate::database::models::{CreationType, Page, PageOutline, Project, Settings};
use crate::errors::{AppError, AppResult};
use adapters::{download_image, GeneratedImage, ImageProvider, ImageRequest, ReferenceImage, TextProvider};
use image::{DynamicImage, Rgb, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const JSON_ATTEMPTS: usize = 3;
const TEST_THINKING_BUDGET: u32 = 64;
const CAPTION_TEST_PROMPT: &str =
    "Describe this image in one short sentence. Reply with the description only.";

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[(.*?)\]\(([^)]*)\)").expect("valid regex"));
static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));

/// The user's original project input.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub idea_prompt: Option<String>,
    pub outline_text: Option<String>,
    pub description_text: Option<String>,
    pub creation_type: CreationType,
}

impl From<&Project> for ProjectContext {
    fn from(project: &Project) -> Self {
        Self {
            idea_prompt: project.idea_prompt.clone(),
            outline_text: project.outline_text.clone(),
            description_text: project.description_text.clone(),
            creation_type: project.creation_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlinePage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
}

impl OutlinePage {
    pub fn to_page_outline(&self) -> PageOutline {
        PageOutline {
            title: self.title.clone(),
            points: self.points.clone(),
        }
    }

    pub fn from_page(page: &Page) -> Self {
        let outline = page.outline().unwrap_or_default();
        Self {
            title: outline.title,
            points: outline.points,
            part: page.part.clone(),
        }
    }
}

/// One outline entry: a part grouping pages, or a standalone page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutlineItem {
    Part { part: String, pages: Vec<OutlinePage> },
    Page(OutlinePage),
}

/// Expands parts into their pages, tagging each with its part name.
pub fn flatten_outline(outline: &[OutlineItem]) -> Vec<OutlinePage> {
    let mut pages = Vec::new();
    for item in outline {
        match item {
            OutlineItem::Part { part, pages: children } => {
                pages.extend(children.iter().map(|page| OutlinePage {
                    part: Some(part.clone()),
                    ..page.clone()
                }));
            }
            OutlineItem::Page(page) => pages.push(page.clone()),
        }
    }
    pages
}

/// Rebuilds the nested outline from stored pages, grouping consecutive
/// pages that share a part.
pub fn outline_from_pages(pages: &[Page]) -> Vec<OutlineItem> {
    let mut outline: Vec<OutlineItem> = Vec::new();
    for page in pages {
        let entry = OutlinePage::from_page(page);
        match entry.part.clone() {
            Some(part) => {
                let child = OutlinePage { part: None, ..entry };
                match outline.last_mut() {
                    Some(OutlineItem::Part { part: last, pages }) if *last == part => pages.push(child),
                    _ => outline.push(OutlineItem::Part {
                        part,
                        pages: vec![child],
                    }),
                }
            }
            None => outline.push(OutlineItem::Page(entry)),
        }
    }
    outline
}

/// Numbered list of top-level outline entries.
pub fn outline_text(outline: &[OutlineItem]) -> String {
    outline
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let label = match item {
                OutlineItem::Part { part, .. } => part.as_str(),
                OutlineItem::Page(page) if !page.title.is_empty() => page.title.as_str(),
                OutlineItem::Page(_) => "Untitled",
            };
            format!("{}. {}", index + 1, label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A page's current description, as shown to the refinement prompt.
#[derive(Debug, Clone)]
pub struct DescriptionEntry {
    pub index: usize,
    pub title: String,
    pub description: Option<String>,
}

/// `![..](url)` targets that are http(s) URLs or `/files/` paths.
pub fn extract_image_urls_from_markdown(text: &str) -> Vec<String> {
    MARKDOWN_IMAGE
        .captures_iter(text)
        .map(|caps| caps[2].trim().to_string())
        .filter(|url| {
            url.starts_with("http://") || url.starts_with("https://") || url.starts_with("/files/")
        })
        .collect()
}

/// Replaces markdown images with their alt text (dropped when empty) and
/// collapses runs of blank lines.
pub fn remove_markdown_images(text: &str) -> String {
    let replaced = MARKDOWN_IMAGE.replace_all(text, |caps: &regex::Captures<'_>| {
        caps[1].trim().to_string()
    });
    EXTRA_BLANK_LINES.replace_all(&replaced, "\n\n").into_owned()
}

/// Strips surrounding whitespace and markdown code fences.
pub fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Removes indentation common to every non-blank line.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-request generation options derived from the settings.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub output_language: String,
    pub text_thinking_budget: u32,
    pub enable_image_reasoning: bool,
    pub image_thinking_budget: u32,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl From<&Settings> for GenerationOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            output_language: settings.output_language.clone(),
            text_thinking_budget: settings.effective_text_budget(),
            enable_image_reasoning: settings.enable_image_reasoning,
            image_thinking_budget: settings.effective_image_budget(),
            aspect_ratio: settings.image_aspect_ratio.clone(),
            resolution: settings.image_resolution.clone(),
        }
    }
}

pub struct AiService {
    text: Arc<dyn TextProvider>,
    image: Arc<dyn ImageProvider>,
    options: GenerationOptions,
    files: Arc<FileService>,
}

impl AiService {
    pub fn new(
        text: Arc<dyn TextProvider>,
        image: Arc<dyn ImageProvider>,
        options: GenerationOptions,
        files: Arc<FileService>,
    ) -> Self {
        Self {
            text,
            image,
            options,
            files,
        }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    fn language(&self) -> &str {
        &self.options.output_language
    }

    /// Generates and parses JSON, regenerating on parse failure.
    pub async fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> AppResult<T> {
        let mut last_error = String::new();
        for attempt in 1..=JSON_ATTEMPTS {
            let response = self
                .text
                .generate_text(prompt, self.options.text_thinking_budget)
                .await?;
            let cleaned = strip_json_fences(&response);
            match serde_json::from_str::<T>(cleaned) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let preview: String = cleaned.chars().take(200).collect();
                    warn!(attempt, "Failed to parse model JSON, regenerating: {err}; text: {preview}");
                    last_error = err.to_string();
                }
            }
        }
        Err(AppError::api(
            axum::http::StatusCode::BAD_GATEWAY,
            "AI_INVALID_JSON",
            format!("Model did not return valid JSON after {JSON_ATTEMPTS} attempts: {last_error}"),
        ))
    }

    pub async fn generate_outline(&self, context: &ProjectContext) -> AppResult<Vec<OutlineItem>> {
        self.generate_json(&prompts::outline_generation(context, self.language()))
            .await
    }

    pub async fn parse_outline_text(&self, context: &ProjectContext) -> AppResult<Vec<OutlineItem>> {
        self.generate_json(&prompts::outline_parsing(context, self.language()))
            .await
    }

    pub async fn parse_description_to_outline(
        &self,
        context: &ProjectContext,
    ) -> AppResult<Vec<OutlineItem>> {
        self.generate_json(&prompts::description_to_outline(context, self.language()))
            .await
    }

    /// One description per outline page. A non-list reply is an error.
    pub async fn parse_description_to_page_descriptions(
        &self,
        context: &ProjectContext,
        outline: &[OutlineItem],
    ) -> AppResult<Vec<String>> {
        let prompt = prompts::description_split(context, outline, self.language());
        let value: serde_json::Value = self.generate_json(&prompt).await?;
        string_list(value)
    }

    pub async fn refine_outline(
        &self,
        current: &[OutlineItem],
        requirement: &str,
        context: &ProjectContext,
        previous: &[String],
    ) -> AppResult<Vec<OutlineItem>> {
        let prompt =
            prompts::outline_refinement(current, requirement, context, previous, self.language());
        self.generate_json(&prompt).await
    }

    pub async fn refine_descriptions(
        &self,
        current: &[DescriptionEntry],
        requirement: &str,
        context: &ProjectContext,
        outline: &[OutlineItem],
        previous: &[String],
    ) -> AppResult<Vec<String>> {
        let prompt = prompts::descriptions_refinement(
            current,
            requirement,
            context,
            outline,
            previous,
            self.language(),
        );
        let value: serde_json::Value = self.generate_json(&prompt).await?;
        string_list(value)
    }

    /// `page_index` is 1-based.
    pub async fn generate_page_description(
        &self,
        context: &ProjectContext,
        outline: &[OutlineItem],
        page: &OutlinePage,
        page_index: usize,
    ) -> AppResult<String> {
        let prompt = prompts::page_description(
            context,
            &outline_text(outline),
            page,
            page_index,
            self.language(),
        );
        let text = self
            .text
            .generate_text(&prompt, self.options.text_thinking_budget)
            .await?;
        Ok(dedent(&text))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn generate_image_prompt(
        &self,
        outline: &[OutlineItem],
        page: &OutlinePage,
        description: &str,
        page_index: usize,
        has_material_images: bool,
        has_template: bool,
        extra_requirements: Option<&str>,
        template_style: Option<&str>,
    ) -> String {
        let section = page
            .part
            .clone()
            .unwrap_or_else(|| if page.title.is_empty() { "Untitled".to_string() } else { page.title.clone() });
        let cleaned = remove_markdown_images(description);
        let outline_text = outline_text(outline);
        prompts::image_generation(
            &ImagePromptInput {
                page_description: &cleaned,
                outline_text: &outline_text,
                current_section: &section,
                page_index,
                has_material_images,
                has_template,
                extra_requirements,
                template_style,
            },
            self.language(),
        )
    }

    /// Generates an image. `template` becomes the first reference; each
    /// additional reference is an http(s) URL or a `/files/` path, and
    /// unusable ones are skipped.
    pub async fn generate_image(
        &self,
        prompt: &str,
        template: Option<&Path>,
        additional: &[String],
    ) -> AppResult<GeneratedImage> {
        let mut ref_images = Vec::new();
        if let Some(path) = template {
            if !path.is_file() {
                return Err(AppError::not_found(format!(
                    "Reference image not found: {}",
                    path.display()
                )));
            }
            ref_images.push(self.files.load_reference_image(path).await?);
        }
        for reference in additional {
            match self.load_additional_reference(reference).await {
                Some(image) => ref_images.push(image),
                None => warn!("Skipping unusable reference image: {reference}"),
            }
        }

        debug!(
            references = ref_images.len(),
            aspect_ratio = %self.options.aspect_ratio,
            resolution = %self.options.resolution,
            "Calling image provider"
        );
        let request = ImageRequest {
            prompt: prompt.to_string(),
            ref_images,
            aspect_ratio: self.options.aspect_ratio.clone(),
            resolution: self.options.resolution.clone(),
            enable_thinking: self.options.enable_image_reasoning,
            thinking_budget: self.options.image_thinking_budget,
        };
        Ok(self.image.generate_image(&request).await?)
    }

    async fn load_additional_reference(&self, reference: &str) -> Option<ReferenceImage> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let downloaded = download_image(reference)
                .await
                .map_err(|err| warn!("Failed to download image from {reference}: {err}"))
                .ok()?;
            return reference_from_bytes(downloaded.bytes).ok();
        }
        let path = self.files.resolve_files_url(reference)?;
        self.files.load_reference_image(&path).await.ok()
    }

    /// Edits the image at `current_image` following `instruction`.
    pub async fn edit_image(
        &self,
        instruction: &str,
        current_image: &Path,
        original_description: Option<&str>,
        additional: &[String],
    ) -> AppResult<GeneratedImage> {
        let prompt = prompts::image_edit(instruction, original_description);
        self.generate_image(&prompt, Some(current_image), additional)
            .await
    }

    pub async fn generate_material_image(&self, prompt: &str) -> AppResult<GeneratedImage> {
        self.generate_image(&prompts::material_image(prompt), None, &[])
            .await
    }

    /// Connectivity check for the text model.
    pub async fn test_text_model(&self) -> AppResult<String> {
        let reply = self
            .text
            .generate_text("Reply with OK only.", TEST_THINKING_BUDGET)
            .await?;
        Ok(reply.trim().to_string())
    }

    /// Connectivity check for the image model.
    pub async fn test_image_model(&self) -> AppResult<GeneratedImage> {
        self.generate_image(
            "Generate a simple, clean presentation slide background with a soft blue gradient.",
            None,
            &[],
        )
        .await
    }
}

/// Connectivity check for the caption model: asks `provider` to describe a
/// generated test image.
pub async fn test_caption_model(provider: &dyn TextProvider) -> AppResult<String> {
    let image = caption_test_image()?;
    let caption = provider
        .generate_with_image(CAPTION_TEST_PROMPT, &image, TEST_THINKING_BUDGET)
        .await?;
    Ok(caption.trim().to_string())
}

/// A blue rectangle on white.
fn caption_test_image() -> AppResult<ReferenceImage> {
    let mut canvas = RgbImage::from_pixel(128, 96, Rgb([255, 255, 255]));
    for x in 32..96 {
        for y in 24..72 {
            canvas.put_pixel(x, y, Rgb([40, 90, 200]));
        }
    }
    let png = encode_png(&DynamicImage::ImageRgb8(canvas))?;
    Ok(ReferenceImage::new(png, "image/png"))
}

fn string_list(value: serde_json::Value) -> AppResult<Vec<String>> {
    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            })
            .collect()),
        other => Err(AppError::api(
            axum::http::StatusCode::BAD_GATEWAY,
            "AI_INVALID_JSON",
            format!("Expected a list of page descriptions, got: {other}"),
        )),
    }
}
