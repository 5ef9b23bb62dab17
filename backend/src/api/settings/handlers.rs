//! Handler functions for reading, updating and testing settings.

use crate::database::models::{Settings, SettingsView};
use crate::database::queries;
use crate::errors::{ApiResponse, AppError, AppResult, OptionalJson};
use crate::services::ai_service::test_caption_model;
use crate::services::settings::{self as settings_service, SettingsUpdate};
use crate::AppState;
use adapters::AdapterError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tracing::info;

/// A provider without image input is a 400, not an upstream failure.
fn caption_failure(err: AppError) -> AppError {
    match err {
        AppError::Ai(AdapterError::Unsupported(provider)) => AppError::api(
            StatusCode::BAD_REQUEST,
            "CAPTION_MODEL_UNSUPPORTED",
            format!("The configured {provider} cannot describe images"),
        ),
        other => other,
    }
}

async fn save(state: &AppState, settings: Settings) -> AppResult<()> {
    state
        .db
        .call(move |conn| queries::save_settings(conn, &settings))
        .await?;
    state.ai.invalidate().await;
    Ok(())
}

/// `GET /api/settings`
pub async fn get_settings(State(state): State<AppState>) -> AppResult<ApiResponse<SettingsView>> {
    let settings = settings_service::load(&state.db, &state.config).await?;
    Ok(ApiResponse::ok(settings.view()))
}

/// `PUT /api/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    OptionalJson(body): OptionalJson<Value>,
) -> AppResult<ApiResponse<SettingsView>> {
    let body = match body {
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        Some(Value::Object(_)) | None => {
            return Err(AppError::bad_request("Request body is required"));
        }
        Some(_) => return Err(AppError::bad_request("Request body must be a JSON object")),
    };
    let update: SettingsUpdate =
        serde_json::from_value(body).map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut settings = settings_service::load(&state.db, &state.config).await?;
    let changed = update.apply(&mut settings)?;
    let view = settings.view();
    save(&state, settings).await?;
    if changed.is_empty() {
        info!("Settings updated");
    } else {
        info!("Settings updated, AI configuration changed: {}", changed.join(", "));
    }
    Ok(ApiResponse::ok(view).with_message("Settings updated successfully"))
}

/// `POST /api/settings/reset`
pub async fn reset_settings(State(state): State<AppState>) -> AppResult<ApiResponse<SettingsView>> {
    let current = settings_service::load(&state.db, &state.config).await?;
    let mut settings = Settings::from_config(&state.config);
    settings.created_at = current.created_at;
    let changed = settings_service::ai_changes(&current, &settings);
    let view = settings.view();
    save(&state, settings).await?;
    info!("Settings reset to defaults, AI fields restored: {}", changed.join(", "));
    Ok(ApiResponse::ok(view).with_message("Settings reset to defaults"))
}

/// `POST /api/settings/tests/:name`
pub async fn run_service_test(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    if !matches!(name.as_str(), "text-model" | "image-model" | "caption-model") {
        return Err(AppError::bad_request("Unknown test type"));
    }
    let settings = settings_service::load(&state.db, &state.config).await?;

    let data = match name.as_str() {
        "text-model" => {
            let ai = state.ai.service(&settings).await?;
            let reply = ai.test_text_model().await?;
            json!({ "reply": reply })
        }
        "caption-model" => {
            let provider = state.ai.caption_provider(&settings)?;
            let caption = test_caption_model(provider.as_ref())
                .await
                .map_err(caption_failure)?;
            if caption.is_empty() {
                return Err(AppError::api(
                    StatusCode::BAD_GATEWAY,
                    "CAPTION_TEST_FAILED",
                    "Caption model returned an empty result",
                ));
            }
            json!({ "caption": caption })
        }
        _ => {
            let ai = state.ai.service(&settings).await?;
            let generated = ai.test_image_model().await?;
            if generated.bytes.is_empty() {
                return Err(AppError::api(
                    StatusCode::BAD_GATEWAY,
                    "IMAGE_MODEL_TEST_FAILED",
                    "Image model returned no image",
                ));
            }
            let image = image::load_from_memory(&generated.bytes)?;
            json!({ "image_size": [image.width(), image.height()] })
        }
    };
    info!(test = %name, "Service test passed");
    Ok(ApiResponse::ok(data).with_message("Test passed"))
}

#[cfg(test)]
mod tests {
    use super::caption_failure;
    use crate::errors::AppError;
    use adapters::AdapterError;
    use axum::http::StatusCode;

    #[test]
    fn unsupported_caption_providers_are_client_errors() {
        let err = caption_failure(AppError::from(AdapterError::Unsupported("text provider")));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "CAPTION_MODEL_UNSUPPORTED");

        let err = caption_failure(AppError::from(AdapterError::NoImage("openai")));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
