//! Persisted settings: loading, partial updates and validation.

use crate::config::Config;
use crate::database::models::Settings;
use crate::database::{queries, Database};
use crate::errors::{AppError, AppResult};
use crate::utils::{deserialize_some, non_blank, now};
use adapters::ProviderFormat;
use serde::Deserialize;

const RESOLUTIONS: [&str; 3] = ["1K", "2K", "4K"];
const LANGUAGES: [&str; 4] = ["zh", "en", "ja", "auto"];
const MAX_WORKERS: u32 = 20;
const MAX_THINKING_BUDGET: u32 = 8192;

/// Returns the singleton settings row, creating it from `config` on first use.
pub async fn load(db: &Database, config: &Config) -> AppResult<Settings> {
    let defaults = Settings::from_config(config);
    Ok(db
        .call(move |conn| queries::get_or_create_settings(conn, &defaults))
        .await?)
}

/// A partial update. Absent keys are left alone; for the nullable fields an
/// explicit `null` clears the value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub ai_provider_format: Option<String>,
    #[serde(deserialize_with = "deserialize_some")]
    pub api_base_url: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub api_key: Option<Option<String>>,
    pub image_resolution: Option<String>,
    pub image_aspect_ratio: Option<String>,
    pub max_description_workers: Option<u32>,
    pub max_image_workers: Option<u32>,
    #[serde(deserialize_with = "deserialize_some")]
    pub text_model: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub image_model: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub image_caption_model: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub mineru_api_base: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub mineru_token: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub baidu_ocr_api_key: Option<Option<String>>,
    pub output_language: Option<String>,
    pub enable_text_reasoning: Option<bool>,
    pub text_thinking_budget: Option<u32>,
    pub enable_image_reasoning: Option<bool>,
    pub image_thinking_budget: Option<u32>,
}

fn check_range(value: Option<u32>, max: u32, message: &str) -> AppResult<()> {
    match value {
        Some(v) if v < 1 || v > max => Err(AppError::bad_request(message)),
        _ => Ok(()),
    }
}

impl SettingsUpdate {
    /// Rejects the whole update if any present field is invalid.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(format) = &self.ai_provider_format {
            format.parse::<ProviderFormat>().map_err(|_| {
                AppError::bad_request("AI provider format must be 'openai' or 'gemini'")
            })?;
        }
        if let Some(resolution) = &self.image_resolution {
            if !RESOLUTIONS.contains(&resolution.as_str()) {
                return Err(AppError::bad_request("Resolution must be 1K, 2K, or 4K"));
            }
        }
        check_range(
            self.max_description_workers,
            MAX_WORKERS,
            "Max description workers must be between 1 and 20",
        )?;
        check_range(
            self.max_image_workers,
            MAX_WORKERS,
            "Max image workers must be between 1 and 20",
        )?;
        if let Some(language) = &self.output_language {
            if !LANGUAGES.contains(&language.as_str()) {
                return Err(AppError::bad_request(
                    "Output language must be 'zh', 'en', 'ja', or 'auto'",
                ));
            }
        }
        check_range(
            self.text_thinking_budget,
            MAX_THINKING_BUDGET,
            "Text thinking budget must be between 1 and 8192",
        )?;
        check_range(
            self.image_thinking_budget,
            MAX_THINKING_BUDGET,
            "Image thinking budget must be between 1 and 8192",
        )?;
        Ok(())
    }

    /// Validates and applies the update. Returns the names of the changed
    /// fields that affect the AI providers.
    pub fn apply(self, settings: &mut Settings) -> AppResult<Vec<&'static str>> {
        self.validate()?;
        let before = settings.clone();

        if let Some(format) = self.ai_provider_format {
            settings.ai_provider_format = format.trim().to_ascii_lowercase();
        }
        if let Some(base) = self.api_base_url {
            settings.api_base_url = non_blank(base.as_deref());
        }
        if let Some(key) = self.api_key {
            settings.api_key = non_blank(key.as_deref());
        }
        if let Some(resolution) = self.image_resolution {
            settings.image_resolution = resolution;
        }
        if let Some(ratio) = self.image_aspect_ratio {
            settings.image_aspect_ratio = ratio;
        }
        if let Some(workers) = self.max_description_workers {
            settings.max_description_workers = workers;
        }
        if let Some(workers) = self.max_image_workers {
            settings.max_image_workers = workers;
        }
        if let Some(model) = self.text_model {
            settings.text_model = non_blank(model.as_deref());
        }
        if let Some(model) = self.image_model {
            settings.image_model = non_blank(model.as_deref());
        }
        if let Some(model) = self.image_caption_model {
            settings.image_caption_model = non_blank(model.as_deref());
        }
        if let Some(base) = self.mineru_api_base {
            settings.mineru_api_base = non_blank(base.as_deref());
        }
        if let Some(token) = self.mineru_token {
            settings.mineru_token = non_blank(token.as_deref());
        }
        if let Some(key) = self.baidu_ocr_api_key {
            settings.baidu_ocr_api_key = non_blank(key.as_deref());
        }
        if let Some(language) = self.output_language {
            settings.output_language = language;
        }
        if let Some(enabled) = self.enable_text_reasoning {
            settings.enable_text_reasoning = enabled;
        }
        if let Some(budget) = self.text_thinking_budget {
            settings.text_thinking_budget = budget;
        }
        if let Some(enabled) = self.enable_image_reasoning {
            settings.enable_image_reasoning = enabled;
        }
        if let Some(budget) = self.image_thinking_budget {
            settings.image_thinking_budget = budget;
        }
        settings.updated_at = now();

        Ok(ai_changes(&before, settings))
    }
}

/// Names of the AI-relevant fields that differ between `before` and `after`.
pub fn ai_changes(before: &Settings, after: &Settings) -> Vec<&'static str> {
    let mut changed = Vec::new();
    let mut check = |name: &'static str, differs: bool| {
        if differs {
            changed.push(name);
        }
    };
    check("ai_provider_format", before.ai_provider_format != after.ai_provider_format);
    check("api_base_url", before.api_base_url != after.api_base_url);
    check("api_key", before.api_key != after.api_key);
    check("text_model", before.text_model != after.text_model);
    check("image_model", before.image_model != after.image_model);
    check("image_resolution", before.image_resolution != after.image_resolution);
    check("image_aspect_ratio", before.image_aspect_ratio != after.image_aspect_ratio);
    check("output_language", before.output_language != after.output_language);
    check(
        "enable_text_reasoning",
        before.enable_text_reasoning != after.enable_text_reasoning,
    );
    check(
        "text_thinking_budget",
        before.text_thinking_budget != after.text_thinking_budget,
    );
    check(
        "enable_image_reasoning",
        before.enable_image_reasoning != after.enable_image_reasoning,
    );
    check(
        "image_thinking_budget",
        before.image_thinking_budget != after.image_thinking_budget,
    );
    changed
}
