//! Builds and caches the `AiService` for the current settings.
//!
//! Providers are created lazily on the first generation request and reused
//! until the settings change. The cached service remembers the `updated_at`
//! of the settings it was built from, so a request carrying newer settings
//! rebuilds it even if it races with `invalidate`.

use super::ai_service::{AiService, GenerationOptions};
use super::file_service::FileService;
use crate::config::Config;
use crate::database::models::Settings;
use crate::errors::AppResult;
use adapters::{AdapterResult, ImageProvider, ProviderConfig, ProviderFormat, TextProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Creates provider clients from a resolved configuration.
pub trait ProviderFactory: Send + Sync {
    fn text(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn TextProvider>>;
    fn image(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn ImageProvider>>;
}

/// The HTTP-backed Gemini and OpenAI-compatible clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteProviders;

impl ProviderFactory for RemoteProviders {
    fn text(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn TextProvider>> {
        adapters::text_provider(config)
    }

    fn image(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn ImageProvider>> {
        adapters::image_provider(config)
    }
}

/// Resolves the provider configuration: persisted settings first, the
/// environment configuration as fallback.
pub fn provider_config(config: &Config, settings: &Settings) -> AdapterResult<ProviderConfig> {
    let format: ProviderFormat = settings.ai_provider_format.parse()?;
    let (default_base, default_key) = config.api_credentials(format);
    let (timeout, max_retries) = config.provider_timeout(format);
    Ok(ProviderConfig {
        format,
        api_key: settings
            .api_key
            .clone()
            .or(default_key)
            .unwrap_or_default(),
        api_base: settings.api_base_url.clone().or(default_base),
        text_model: settings
            .text_model
            .clone()
            .unwrap_or_else(|| config.text_model.clone()),
        image_model: settings
            .image_model
            .clone()
            .unwrap_or_else(|| config.image_model.clone()),
        timeout,
        max_retries,
    })
}

pub struct AiRegistry {
    config: Arc<Config>,
    factory: Arc<dyn ProviderFactory>,
    files: Arc<FileService>,
    cached: RwLock<Option<CachedService>>,
}

struct CachedService {
    settings_updated_at: DateTime<Utc>,
    service: Arc<AiService>,
}

impl CachedService {
    /// Settings older than the ones the service was built from reuse it too.
    fn serves(&self, settings: &Settings) -> bool {
        self.settings_updated_at >= settings.updated_at
    }
}

impl AiRegistry {
    pub fn new(config: Arc<Config>, factory: Arc<dyn ProviderFactory>, files: Arc<FileService>) -> Self {
        Self {
            config,
            factory,
            files,
            cached: RwLock::new(None),
        }
    }

    /// The cached service, or a new one built from `settings`.
    pub async fn service(&self, settings: &Settings) -> AppResult<Arc<AiService>> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.serves(settings) {
                return Ok(Arc::clone(&cached.service));
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(current) = cached.as_ref() {
            if current.serves(settings) {
                return Ok(Arc::clone(&current.service));
            }
        }
        let provider = provider_config(&self.config, settings)?;
        let text = self.factory.text(&provider)?;
        let image = self.factory.image(&provider)?;
        info!(
            format = %provider.format,
            text_model = %provider.text_model,
            image_model = %provider.image_model,
            "AI providers initialised"
        );
        let service = Arc::new(AiService::new(
            text,
            image,
            GenerationOptions::from(settings),
            Arc::clone(&self.files),
        ));
        *cached = Some(CachedService {
            settings_updated_at: settings.updated_at,
            service: Arc::clone(&service),
        });
        Ok(service)
    }

    /// A text provider bound to the image caption model. Built per call and
    /// never cached.
    pub fn caption_provider(&self, settings: &Settings) -> AppResult<Arc<dyn TextProvider>> {
        let mut provider = provider_config(&self.config, settings)?;
        provider.text_model = settings
            .image_caption_model
            .clone()
            .unwrap_or_else(|| self.config.image_caption_model.clone());
        Ok(self.factory.text(&provider)?)
    }

    /// Drops the cached service so the next request sees new settings.
    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::{provider_config, AiRegistry, ProviderFactory};
    use crate::config::Config;
    use crate::database::models::Settings;
    use crate::services::file_service::FileService;
    use adapters::{
        AdapterResult, GeneratedImage, ImageProvider, ImageRequest, ProviderConfig, ProviderFormat,
        TextProvider,
    };
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl TextProvider for Silent {
        fn model(&self) -> &str {
            "silent"
        }

        async fn generate_text(&self, _prompt: &str, _thinking_budget: u32) -> AdapterResult<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl ImageProvider for Silent {
        async fn generate_image(&self, _request: &ImageRequest) -> AdapterResult<GeneratedImage> {
            Ok(GeneratedImage {
                bytes: Vec::new(),
                mime_type: None,
            })
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl ProviderFactory for CountingFactory {
        fn text(&self, _config: &ProviderConfig) -> AdapterResult<Arc<dyn TextProvider>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let text: Arc<dyn TextProvider> = Arc::new(Silent);
            Ok(text)
        }

        fn image(&self, _config: &ProviderConfig) -> AdapterResult<Arc<dyn ImageProvider>> {
            let image: Arc<dyn ImageProvider> = Arc::new(Silent);
            Ok(image)
        }
    }

    #[tokio::test]
    async fn newer_settings_replace_the_cached_service() {
        let config = Config {
            google_api_key: "key".to_string(),
            ..Config::default()
        };
        let factory = Arc::new(CountingFactory::default());
        let shared: Arc<dyn ProviderFactory> = factory.clone();
        let registry = AiRegistry::new(
            Arc::new(config.clone()),
            shared,
            Arc::new(FileService::new(std::env::temp_dir())),
        );
        let builds = || factory.builds.load(Ordering::SeqCst);

        let old = Settings::from_config(&config);
        registry.service(&old).await.unwrap();
        registry.service(&old).await.unwrap();
        assert_eq!(builds(), 1);

        let mut new = old.clone();
        new.updated_at = old.updated_at + Duration::seconds(1);
        registry.service(&new).await.unwrap();
        assert_eq!(builds(), 2);

        // A request that loaded settings before the save keeps the newer service.
        registry.service(&old).await.unwrap();
        assert_eq!(builds(), 2);

        registry.invalidate().await;
        registry.service(&old).await.unwrap();
        assert_eq!(builds(), 3);
    }

    #[test]
    fn settings_override_environment_defaults() {
        let mut config = Config::default();
        config.google_api_key = "env-key".to_string();
        let mut settings = Settings::from_config(&config);
        settings.text_model = None;

        let resolved = provider_config(&config, &settings).unwrap();
        assert_eq!(resolved.format, ProviderFormat::Gemini);
        assert_eq!(resolved.api_key, "env-key");
        assert_eq!(resolved.text_model, config.text_model);

        settings.api_key = Some("db-key".to_string());
        settings.ai_provider_format = "openai".to_string();
        let resolved = provider_config(&config, &settings).unwrap();
        assert_eq!(resolved.format, ProviderFormat::OpenAi);
        assert_eq!(resolved.api_key, "db-key");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let config = Config::default();
        let mut settings = Settings::from_config(&config);
        settings.ai_provider_format = "vertex".to_string();
        assert!(provider_config(&config, &settings).is_err());
    }
}
