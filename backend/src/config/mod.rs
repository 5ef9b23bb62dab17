//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database path, server address, upload folder, AI provider credentials
//! and identity-provider settings. Values come from the environment; the
//! persisted `Settings` row overrides the AI-related ones at runtime.

use adapters::ProviderFormat;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_folder: PathBuf,
    pub max_content_length: usize,

    pub ai_provider_format: ProviderFormat,
    pub google_api_key: String,
    pub google_api_base: String,
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub genai_timeout: Duration,
    pub genai_max_retries: u32,
    pub openai_timeout: Duration,
    pub openai_max_retries: u32,
    pub text_model: String,
    pub image_model: String,
    pub image_caption_model: String,
    pub mineru_api_base: String,
    pub mineru_token: String,
    pub baidu_ocr_api_key: String,

    pub max_description_workers: u32,
    pub max_image_workers: u32,
    pub default_aspect_ratio: String,
    pub default_resolution: String,
    pub output_language: String,

    pub log_level: String,
    pub cors_origins: Vec<String>,

    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub admin_emails: Vec<String>,
    pub allowed_emails: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            database_path: PathBuf::from("instance/database.db"),
            upload_folder: PathBuf::from("uploads"),
            max_content_length: 200 * 1024 * 1024,
            ai_provider_format: ProviderFormat::Gemini,
            google_api_key: String::new(),
            google_api_base: String::new(),
            openai_api_key: String::new(),
            openai_api_base: "https://aihubmix.com/v1".to_string(),
            genai_timeout: Duration::from_secs(300),
            genai_max_retries: 2,
            openai_timeout: Duration::from_secs(300),
            openai_max_retries: 2,
            text_model: "gemini-3-flash-preview".to_string(),
            image_model: "gemini-3-pro-image-preview".to_string(),
            image_caption_model: "gemini-3-flash-preview".to_string(),
            mineru_api_base: "https://mineru.net".to_string(),
            mineru_token: String::new(),
            baidu_ocr_api_key: String::new(),
            max_description_workers: 5,
            max_image_workers: 8,
            default_aspect_ratio: "16:9".to_string(),
            default_resolution: "2K".to_string(),
            output_language: "zh".to_string(),
            log_level: "info".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: String::new(),
            admin_emails: Vec::new(),
            allowed_emails: Vec::new(),
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables, using defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: parsed("HOST", defaults.host),
            port: parsed("PORT", defaults.port),
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            upload_folder: env::var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_folder),
            max_content_length: parsed("MAX_CONTENT_LENGTH", defaults.max_content_length),
            ai_provider_format: parsed("AI_PROVIDER_FORMAT", defaults.ai_provider_format),
            google_api_key: string("GOOGLE_API_KEY", defaults.google_api_key),
            google_api_base: string("GOOGLE_API_BASE", defaults.google_api_base),
            openai_api_key: string("OPENAI_API_KEY", defaults.openai_api_key),
            openai_api_base: string("OPENAI_API_BASE", defaults.openai_api_base),
            genai_timeout: seconds("GENAI_TIMEOUT", defaults.genai_timeout),
            genai_max_retries: parsed("GENAI_MAX_RETRIES", defaults.genai_max_retries),
            openai_timeout: seconds("OPENAI_TIMEOUT", defaults.openai_timeout),
            openai_max_retries: parsed("OPENAI_MAX_RETRIES", defaults.openai_max_retries),
            text_model: string("TEXT_MODEL", defaults.text_model),
            image_model: string("IMAGE_MODEL", defaults.image_model),
            image_caption_model: string("IMAGE_CAPTION_MODEL", defaults.image_caption_model),
            mineru_api_base: string("MINERU_API_BASE", defaults.mineru_api_base),
            mineru_token: string("MINERU_TOKEN", defaults.mineru_token),
            baidu_ocr_api_key: string("BAIDU_OCR_API_KEY", defaults.baidu_ocr_api_key),
            max_description_workers: parsed(
                "MAX_DESCRIPTION_WORKERS",
                defaults.max_description_workers,
            ),
            max_image_workers: parsed("MAX_IMAGE_WORKERS", defaults.max_image_workers),
            default_aspect_ratio: string("DEFAULT_ASPECT_RATIO", defaults.default_aspect_ratio),
            default_resolution: string("DEFAULT_RESOLUTION", defaults.default_resolution),
            output_language: string("OUTPUT_LANGUAGE", defaults.output_language),
            log_level: string("LOG_LEVEL", defaults.log_level).to_lowercase(),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|value| split_list(&value, false))
                .unwrap_or(defaults.cors_origins),
            supabase_url: string("SUPABASE_URL", defaults.supabase_url),
            supabase_service_key: string("SUPABASE_SERVICE_KEY", defaults.supabase_service_key),
            supabase_jwt_secret: string("SUPABASE_JWT_SECRET", defaults.supabase_jwt_secret),
            admin_emails: env::var("ADMIN_EMAILS")
                .map(|value| split_list(&value, true))
                .unwrap_or_default(),
            allowed_emails: env::var("ALLOWED_EMAILS")
                .map(|value| split_list(&value, true))
                .unwrap_or_default(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Authentication is switched on only when the identity provider URL and JWT secret are both set.
    pub fn auth_enabled(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_jwt_secret.is_empty()
    }

    /// Default API base and key for the configured provider format.
    pub fn default_api_credentials(&self) -> (Option<String>, Option<String>) {
        self.api_credentials(self.ai_provider_format)
    }

    /// API base and key from the environment for `format`.
    pub fn api_credentials(&self, format: ProviderFormat) -> (Option<String>, Option<String>) {
        let (base, key) = match format {
            ProviderFormat::OpenAi => (&self.openai_api_base, &self.openai_api_key),
            ProviderFormat::Gemini => (&self.google_api_base, &self.google_api_key),
        };
        (non_empty(base), non_empty(key))
    }

    pub fn provider_timeout(&self, format: ProviderFormat) -> (Duration, u32) {
        match format {
            ProviderFormat::OpenAi => (self.openai_timeout, self.openai_max_retries),
            ProviderFormat::Gemini => (self.genai_timeout, self.genai_max_retries),
        }
    }
}

fn string(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn seconds(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(default)
}

fn split_list(value: &str, lowercase: bool) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if lowercase {
                item.to_lowercase()
            } else {
                item.to_string()
            }
        })
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{split_list, Config};
    use adapters::ProviderFormat;

    #[test]
    fn split_list_trims_and_lowercases() {
        assert_eq!(
            split_list(" A@x.com, ,b@Y.com ", true),
            vec!["a@x.com".to_string(), "b@y.com".to_string()]
        );
    }

    #[test]
    fn auth_requires_url_and_secret() {
        let mut config = Config::default();
        assert!(!config.auth_enabled());
        config.supabase_url = "https://project.supabase.co".to_string();
        assert!(!config.auth_enabled());
        config.supabase_jwt_secret = "secret".to_string();
        assert!(config.auth_enabled());
    }

    #[test]
    fn default_credentials_follow_provider_format() {
        let mut config = Config {
            google_api_key: "g-key".to_string(),
            openai_api_key: "o-key".to_string(),
            ..Config::default()
        };
        assert_eq!(config.default_api_credentials(), (None, Some("g-key".to_string())));

        config.ai_provider_format = ProviderFormat::OpenAi;
        assert_eq!(
            config.default_api_credentials(),
            (
                Some("https://aihubmix.com/v1".to_string()),
                Some("o-key".to_string())
            )
        );
    }
}
