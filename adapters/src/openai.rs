//! OpenAI-compatible adapter implementation for text and image generation.
//!
//! This file contains the concrete implementation of the `TextProvider` and
//! `ImageProvider` traits for chat-completions style endpoints (OpenAI
//! itself or proxies that expose Gemini through the same API), including the
//! request builders and the logic that digs an image out of the many response
//! shapes those proxies produce.

use crate::errors::{AdapterError, AdapterResult};
use crate::http::{api_base, build_client, download_image, send_json, truncate};
use crate::models::{GeneratedImage, ImageRequest, ProviderConfig, ReferenceImage};
use crate::retry::RetryPolicy;
use crate::{ImageProvider, TextProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

const PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

static MARKDOWN_IMAGE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\((https?://[^\s\)]+)\)").expect("valid regex"));
static PLAIN_IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://[^\s\)\]]+\.(?:png|jpg|jpeg|gif|webp|bmp)(?:\?[^\s\)\]]*)?)")
        .expect("valid regex")
});
static BASE64_DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:(image/[^;]+);base64,([A-Za-z0-9+/=]+)").expect("valid regex")
});

struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl ChatClient {
    fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        let base = api_base(config.api_base.as_deref(), DEFAULT_API_BASE);
        Ok(Self {
            http: build_client(PROVIDER, config.timeout)?,
            endpoint: format!("{base}/chat/completions"),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::with_retries(config.max_retries),
        })
    }

    async fn complete(&self, body: &Value) -> AdapterResult<Value> {
        let response = self
            .retry
            .run("openai chat completion", || {
                send_json(
                    PROVIDER,
                    self.http
                        .post(&self.endpoint)
                        .bearer_auth(&self.api_key)
                        .json(body),
                )
            })
            .await?;

        response
            .pointer("/choices/0/message")
            .cloned()
            .ok_or_else(|| AdapterError::invalid(PROVIDER, "response has no choices"))
    }
}

pub struct OpenAiTextProvider {
    client: ChatClient,
    model: String,
}

impl OpenAiTextProvider {
    pub fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
            model: config.text_model.clone(),
        })
    }
}

#[async_trait]
impl TextProvider for OpenAiTextProvider {
    fn model(&self) -> &str {
        &self.model
    }

    /// The chat-completions API has no thinking budget; the argument is ignored.
    async fn generate_text(&self, prompt: &str, _thinking_budget: u32) -> AdapterResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let message = self.client.complete(&body).await?;
        message_text(&message)
            .ok_or_else(|| AdapterError::invalid(PROVIDER, "message has no text content"))
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ReferenceImage,
        _thinking_budget: u32,
    ) -> AdapterResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": image.to_data_url() } },
                    { "type": "text", "text": prompt },
                ],
            }],
        });
        let message = self.client.complete(&body).await?;
        message_text(&message)
            .ok_or_else(|| AdapterError::invalid(PROVIDER, "message has no text content"))
    }
}

pub struct OpenAiImageProvider {
    client: ChatClient,
    model: String,
}

impl OpenAiImageProvider {
    pub fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
            model: config.image_model.clone(),
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    /// Resolution and thinking settings are not expressible over this API.
    async fn generate_image(&self, request: &ImageRequest) -> AdapterResult<GeneratedImage> {
        let body = image_request_body(&self.model, request);
        debug!(
            "Calling OpenAI-compatible image generation with {} reference images, aspect_ratio={}",
            request.ref_images.len(),
            request.aspect_ratio
        );

        let message = self.client.complete(&body).await?;
        for candidate in image_candidates(&message) {
            match candidate {
                ImageSource::Inline(image) => return Ok(image),
                ImageSource::Remote(url) => match download_image(&url).await {
                    Ok(image) => return Ok(image),
                    Err(err) => warn!("Failed to download image from {url}: {err}"),
                },
            }
        }

        warn!(
            "Unable to extract image (model={}), message: {}",
            self.model,
            truncate(&message.to_string(), 200)
        );
        Err(AdapterError::NoImage(PROVIDER))
    }
}

fn image_request_body(model: &str, request: &ImageRequest) -> Value {
    let mut content: Vec<Value> = request
        .ref_images
        .iter()
        .map(|image| json!({ "type": "image_url", "image_url": { "url": image.to_data_url() } }))
        .collect();
    content.push(json!({ "type": "text", "text": request.prompt }));

    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": format!("aspect_ratio={}", request.aspect_ratio) },
            { "role": "user", "content": content },
        ],
        "modalities": ["text", "image"],
    })
}

fn message_text(message: &Value) -> Option<String> {
    match message.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!text.is_empty()).then(|| text.join(""))
        }
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ImageSource {
    Inline(GeneratedImage),
    Remote(String),
}

/// Candidate images in the order they should be tried.
pub(crate) fn image_candidates(message: &Value) -> Vec<ImageSource> {
    let mut candidates = Vec::new();

    if let Some(parts) = message.get("multi_mod_content").and_then(Value::as_array) {
        for part in parts {
            let Some(inline) = part.get("inline_data") else {
                continue;
            };
            let Some(data) = inline.get("data").and_then(Value::as_str) else {
                continue;
            };
            if let Ok(bytes) = BASE64.decode(data) {
                let mime_type = inline
                    .get("mime_type")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                candidates.push(ImageSource::Inline(GeneratedImage { bytes, mime_type }));
            }
        }
    }

    match message.get("content") {
        Some(Value::Array(parts)) => {
            for part in parts {
                if part.get("type").and_then(Value::as_str) != Some("image_url") {
                    continue;
                }
                let url = part
                    .pointer("/image_url/url")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(image) = decode_data_url(url) {
                    candidates.push(ImageSource::Inline(image));
                }
            }
        }
        Some(Value::String(text)) => {
            if let Some(url) = MARKDOWN_IMAGE_URL
                .captures(text)
                .and_then(|caps| caps.get(1))
            {
                candidates.push(ImageSource::Remote(url.as_str().to_string()));
            }
            for caps in PLAIN_IMAGE_URL.captures_iter(text) {
                let url = ImageSource::Remote(caps[1].to_string());
                if !candidates.contains(&url) {
                    candidates.push(url);
                }
            }
            if let Some(caps) = BASE64_DATA_URL.captures(text) {
                if let Ok(bytes) = BASE64.decode(&caps[2]) {
                    candidates.push(ImageSource::Inline(GeneratedImage {
                        bytes,
                        mime_type: Some(caps[1].to_string()),
                    }));
                }
            }
        }
        _ => {}
    }

    candidates
}

fn decode_data_url(url: &str) -> Option<GeneratedImage> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    if !header.starts_with("image") {
        return None;
    }
    let mime_type = header.split(';').next().map(str::to_string);
    let bytes = BASE64.decode(data).ok()?;
    Some(GeneratedImage { bytes, mime_type })
}

#[cfg(test)]
mod tests {
    use super::{image_candidates, image_request_body, message_text, ImageSource};
    use crate::models::{GeneratedImage, ImageRequest, ReferenceImage};
    use serde_json::json;

    #[test]
    fn prefers_multi_mod_inline_data() {
        let message = json!({
            "multi_mod_content": [
                { "text": "here you go" },
                { "inline_data": { "data": "AQID", "mime_type": "image/png" } }
            ],
            "content": "ignored ![x](https://cdn.example.com/a.png)"
        });
        let candidates = image_candidates(&message);
        assert_eq!(
            candidates[0],
            ImageSource::Inline(GeneratedImage {
                bytes: vec![1, 2, 3],
                mime_type: Some("image/png".to_string()),
            })
        );
    }

    #[test]
    fn reads_data_url_parts_from_list_content() {
        let message = json!({
            "content": [
                { "type": "text", "text": "done" },
                { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,AQID" } }
            ]
        });
        let candidates = image_candidates(&message);
        assert_eq!(candidates.len(), 1);
        assert!(matches!(&candidates[0], ImageSource::Inline(image) if image.bytes == vec![1, 2, 3]));
    }

    #[test]
    fn string_content_yields_urls_then_embedded_base64() {
        let message = json!({
            "content": "Result: ![slide](https://cdn.example.com/out.png) also https://img.example.com/b.webp?x=1 data:image/png;base64,AQID"
        });
        let candidates = image_candidates(&message);
        assert_eq!(
            candidates[0],
            ImageSource::Remote("https://cdn.example.com/out.png".to_string())
        );
        assert_eq!(
            candidates[1],
            ImageSource::Remote("https://img.example.com/b.webp?x=1".to_string())
        );
        assert!(matches!(&candidates[2], ImageSource::Inline(_)));
    }

    #[test]
    fn plain_text_without_images_has_no_candidates() {
        assert!(image_candidates(&json!({ "content": "sorry, I cannot draw" })).is_empty());
    }

    #[test]
    fn image_body_puts_references_before_prompt() {
        let mut request = ImageRequest::new("draw a slide");
        request.aspect_ratio = "4:3".to_string();
        request.ref_images.push(ReferenceImage::new(vec![0], "image/jpeg"));
        let body = image_request_body("img-model", &request);

        assert_eq!(body["messages"][0]["content"], "aspect_ratio=4:3");
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[1]["text"], "draw a slide");
        assert_eq!(body["modalities"], json!(["text", "image"]));
    }

    #[test]
    fn message_text_joins_text_parts() {
        let message = json!({ "content": [
            { "type": "text", "text": "a" },
            { "type": "text", "text": "b" }
        ]});
        assert_eq!(message_text(&message).as_deref(), Some("ab"));
    }
}
