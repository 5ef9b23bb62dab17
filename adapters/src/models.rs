//! Generic data models for the `adapters` crate.
//!
//! These models define provider-neutral representations of generation
//! requests, reference images, generated images and verified identities, so
//! the backend services can talk to any provider with one data format.

use crate::errors::AdapterError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Wire format spoken by the configured AI endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFormat {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFormat {
    type Err = AdapterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(AdapterError::Configuration(format!(
                "unknown AI provider format `{other}`; expected gemini|openai"
            ))),
        }
    }
}

/// Everything needed to build text and image providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub format: ProviderFormat,
    pub api_key: String,
    pub api_base: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

/// An image handed to a provider as additional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ReferenceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub ref_images: Vec<ReferenceImage>,
    /// e.g. "16:9", "4:3", "1:1"
    pub aspect_ratio: String,
    /// "1K", "2K" or "4K"; OpenAI-compatible endpoints ignore it.
    pub resolution: String,
    pub enable_thinking: bool,
    pub thinking_budget: u32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ref_images: Vec::new(),
            aspect_ratio: "16:9".to_string(),
            resolution: "2K".to_string(),
            enable_thinking: false,
            thinking_budget: 0,
        }
    }
}

/// Raw encoded image bytes as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// User identity as confirmed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{ProviderFormat, ReferenceImage};

    #[test]
    fn provider_format_parses_case_insensitively() {
        assert_eq!(" OpenAI ".parse::<ProviderFormat>().unwrap(), ProviderFormat::OpenAi);
        assert_eq!("gemini".parse::<ProviderFormat>().unwrap(), ProviderFormat::Gemini);
        assert!("vertex".parse::<ProviderFormat>().is_err());
    }

    #[test]
    fn reference_image_renders_data_url() {
        let image = ReferenceImage::new(vec![1, 2, 3], "image/png");
        assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
    }
}
