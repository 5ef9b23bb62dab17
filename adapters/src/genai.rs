//! Gemini adapter implementation for text and image generation.
//!
//! This file contains the concrete implementation of the `TextProvider` and
//! `ImageProvider` traits for the Google Generative Language REST API
//! (`models/{model}:generateContent`), including thinking-budget handling and
//! conversion of inline image parts.

use crate::errors::{AdapterError, AdapterResult};
use crate::http::{api_base, build_client, send_json};
use crate::models::{GeneratedImage, ImageRequest, ProviderConfig, ReferenceImage};
use crate::retry::RetryPolicy;
use crate::{ImageProvider, TextProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::debug;
use reqwest::Client;
use serde_json::{json, Map, Value};

const PROVIDER: &str = "gemini";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

struct GenAiClient {
    http: Client,
    base: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GenAiClient {
    fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        let base = api_base(config.api_base.as_deref(), DEFAULT_API_BASE);
        Ok(Self {
            http: build_client(PROVIDER, config.timeout)?,
            base: base.to_string(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy::with_retries(config.max_retries),
        })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> AdapterResult<Value> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base, model);
        self.retry
            .run("gemini generateContent", || {
                send_json(
                    PROVIDER,
                    self.http
                        .post(&url)
                        .header("x-goog-api-key", &self.api_key)
                        .json(body),
                )
            })
            .await
    }
}

pub struct GenAiTextProvider {
    client: GenAiClient,
    model: String,
}

impl GenAiTextProvider {
    pub fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: GenAiClient::new(config)?,
            model: config.text_model.clone(),
        })
    }

    async fn generate(&self, parts: Vec<Value>, thinking_budget: u32) -> AdapterResult<String> {
        let body = content_body(parts, generation_config_for_text(thinking_budget));
        let response = self.client.generate_content(&self.model, &body).await?;
        response_text(&response)
            .ok_or_else(|| AdapterError::invalid(PROVIDER, "candidate has no text parts"))
    }
}

#[async_trait]
impl TextProvider for GenAiTextProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, prompt: &str, thinking_budget: u32) -> AdapterResult<String> {
        self.generate(vec![json!({ "text": prompt })], thinking_budget)
            .await
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image: &ReferenceImage,
        thinking_budget: u32,
    ) -> AdapterResult<String> {
        self.generate(
            vec![inline_part(image), json!({ "text": prompt })],
            thinking_budget,
        )
        .await
    }
}

pub struct GenAiImageProvider {
    client: GenAiClient,
    model: String,
}

impl GenAiImageProvider {
    pub fn new(config: &ProviderConfig) -> AdapterResult<Self> {
        Ok(Self {
            client: GenAiClient::new(config)?,
            model: config.image_model.clone(),
        })
    }
}

#[async_trait]
impl ImageProvider for GenAiImageProvider {
    async fn generate_image(&self, request: &ImageRequest) -> AdapterResult<GeneratedImage> {
        let mut parts: Vec<Value> = request.ref_images.iter().map(inline_part).collect();
        parts.push(json!({ "text": request.prompt }));

        debug!(
            "Calling Gemini image generation with {} reference images, aspect_ratio={}, resolution={}",
            request.ref_images.len(),
            request.aspect_ratio,
            request.resolution
        );
        let body = content_body(parts, generation_config_for_image(request));
        let response = self.client.generate_content(&self.model, &body).await?;
        response_image(&response)?.ok_or(AdapterError::NoImage(PROVIDER))
    }
}

fn inline_part(image: &ReferenceImage) -> Value {
    json!({
        "inline_data": {
            "mime_type": image.mime_type,
            "data": image.to_base64(),
        }
    })
}

fn content_body(parts: Vec<Value>, generation_config: Option<Value>) -> Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }],
    });
    if let Some(config) = generation_config {
        body["generationConfig"] = config;
    }
    body
}

/// Thinking is only switched on for a positive budget.
fn generation_config_for_text(thinking_budget: u32) -> Option<Value> {
    (thinking_budget > 0).then(|| {
        json!({
            "thinkingConfig": { "thinkingBudget": thinking_budget }
        })
    })
}

fn generation_config_for_image(request: &ImageRequest) -> Option<Value> {
    let mut config = Map::new();
    config.insert("responseModalities".into(), json!(["TEXT", "IMAGE"]));
    config.insert(
        "imageConfig".into(),
        json!({
            "aspectRatio": request.aspect_ratio,
            "imageSize": request.resolution,
        }),
    );
    if request.enable_thinking && request.thinking_budget > 0 {
        config.insert(
            "thinkingConfig".into(),
            json!({ "thinkingBudget": request.thinking_budget }),
        );
    }
    Some(Value::Object(config))
}

fn candidate_parts(response: &Value) -> &[Value] {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn response_text(response: &Value) -> Option<String> {
    let text: Vec<&str> = candidate_parts(response)
        .iter()
        .filter(|part| part.get("thought").and_then(Value::as_bool) != Some(true))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then(|| text.concat())
}

fn response_image(response: &Value) -> AdapterResult<Option<GeneratedImage>> {
    for part in candidate_parts(response) {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(Value::as_str) else {
            continue;
        };
        let bytes = BASE64
            .decode(data)
            .map_err(|err| AdapterError::invalid(PROVIDER, format!("bad image data: {err}")))?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(Some(GeneratedImage { bytes, mime_type }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::{
        content_body, generation_config_for_image, generation_config_for_text, response_image,
        response_text,
    };
    use crate::models::ImageRequest;
    use serde_json::json;

    #[test]
    fn zero_budget_disables_thinking() {
        assert!(generation_config_for_text(0).is_none());
        let config = generation_config_for_text(512).unwrap();
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 512);
    }

    #[test]
    fn image_config_carries_ratio_size_and_optional_thinking() {
        let mut request = ImageRequest::new("p");
        request.aspect_ratio = "1:1".to_string();
        request.resolution = "4K".to_string();
        let config = generation_config_for_image(&request).unwrap();
        assert_eq!(config["imageConfig"]["aspectRatio"], "1:1");
        assert_eq!(config["imageConfig"]["imageSize"], "4K");
        assert!(config.get("thinkingConfig").is_none());

        request.enable_thinking = true;
        request.thinking_budget = 256;
        let config = generation_config_for_image(&request).unwrap();
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 256);
    }

    #[test]
    fn body_omits_generation_config_when_absent() {
        let body = content_body(vec![json!({ "text": "hi" })], None);
        assert!(body.get("generationConfig").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn text_skips_thought_parts() {
        let response = json!({ "candidates": [{ "content": { "parts": [
            { "text": "thinking...", "thought": true },
            { "text": "Hello " },
            { "text": "world" }
        ]}}]});
        assert_eq!(response_text(&response).as_deref(), Some("Hello world"));
    }

    #[test]
    fn image_is_first_inline_part() {
        let response = json!({ "candidates": [{ "content": { "parts": [
            { "text": "Here is the slide" },
            { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
        ]}}]});
        let image = response_image(&response).unwrap().unwrap();
        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));

        let empty = json!({ "candidates": [] });
        assert!(response_image(&empty).unwrap().is_none());
    }
}
