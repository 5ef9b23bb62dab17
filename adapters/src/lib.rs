//! Core `adapters` crate for abstracting external AI and identity services.
//!
//! This crate defines the `TextProvider`, `ImageProvider` and
//! `IdentityProvider` traits, which outline the generic functionality the
//! backend needs from third-party APIs, and provides a central point for
//! building the concrete implementations (Gemini, OpenAI-compatible, Supabase).

pub mod errors;
pub mod genai;
pub mod http;
pub mod identity;
pub mod models;
pub mod openai;
pub mod retry;

pub use errors::{AdapterError, AdapterResult};
pub use http::download_image;
pub use models::{
    GeneratedImage, IdentityUser, ImageRequest, ProviderConfig, ProviderFormat, ReferenceImage,
};

use async_trait::async_trait;
use genai::{GenAiImageProvider, GenAiTextProvider};
use openai::{OpenAiImageProvider, OpenAiTextProvider};
use std::sync::Arc;

#[async_trait]
pub trait TextProvider: Send + Sync {
    fn model(&self) -> &str;

    /// A `thinking_budget` of 0 disables reasoning where the provider supports it.
    async fn generate_text(&self, prompt: &str, thinking_budget: u32) -> AdapterResult<String>;

    async fn generate_with_image(
        &self,
        _prompt: &str,
        _image: &ReferenceImage,
        _thinking_budget: u32,
    ) -> AdapterResult<String> {
        Err(AdapterError::Unsupported("text provider"))
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> AdapterResult<GeneratedImage>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer token to the user it was issued for.
    async fn verify_token(&self, token: &str) -> AdapterResult<IdentityUser>;
}

pub fn text_provider(config: &ProviderConfig) -> AdapterResult<Arc<dyn TextProvider>> {
    ensure_api_key(config)?;
    let provider: Arc<dyn TextProvider> = match config.format {
        ProviderFormat::Gemini => Arc::new(GenAiTextProvider::new(config)?),
        ProviderFormat::OpenAi => Arc::new(OpenAiTextProvider::new(config)?),
    };
    Ok(provider)
}

pub fn image_provider(config: &ProviderConfig) -> AdapterResult<Arc<dyn ImageProvider>> {
    ensure_api_key(config)?;
    let provider: Arc<dyn ImageProvider> = match config.format {
        ProviderFormat::Gemini => Arc::new(GenAiImageProvider::new(config)?),
        ProviderFormat::OpenAi => Arc::new(OpenAiImageProvider::new(config)?),
    };
    Ok(provider)
}

fn ensure_api_key(config: &ProviderConfig) -> AdapterResult<()> {
    if config.api_key.trim().is_empty() {
        return Err(AdapterError::Configuration(format!(
            "no API key configured for the {} provider",
            config.format
        )));
    }
    Ok(())
}
