mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn settings_never_expose_secrets() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["ai_provider_format"], "gemini");
    assert_eq!(data["api_key_length"], "test-key".len());
    assert!(data.get("api_key").is_none());
    assert!(data.get("mineru_token").is_none());
    assert_eq!(data["text_thinking_budget"], 1024);
    assert_eq!(data["output_language"], "zh");
}

#[tokio::test]
async fn partial_update_touches_only_present_fields() {
    let app = TestApp::new();
    let (status, body) = app
        .put(
            "/api/settings",
            json!({ "image_resolution": "4K", "api_key": "a-much-longer-key", "text_model": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["image_resolution"], "4K");
    assert_eq!(data["api_key_length"], 17);
    assert_eq!(data["text_model"], json!(null));
    assert_eq!(data["image_aspect_ratio"], "16:9");

    let (_, body) = app.get("/api/settings").await;
    assert_eq!(body["data"]["image_resolution"], "4K");
}

#[tokio::test]
async fn invalid_updates_change_nothing() {
    let app = TestApp::new();
    let cases = [
        (json!({ "image_resolution": "8K" }), "Resolution must be 1K, 2K, or 4K"),
        (
            json!({ "ai_provider_format": "vertex" }),
            "AI provider format must be 'openai' or 'gemini'",
        ),
        (
            json!({ "max_image_workers": 0, "image_resolution": "1K" }),
            "Max image workers must be between 1 and 20",
        ),
        (
            json!({ "output_language": "fr" }),
            "Output language must be 'zh', 'en', 'ja', or 'auto'",
        ),
    ];
    for (body, message) in cases {
        let (status, response) = app.put("/api/settings", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["message"], message);
    }
    let (_, body) = app.get("/api/settings").await;
    assert_eq!(body["data"]["image_resolution"], "2K");

    for body in [json!({}), json!(null)] {
        let (status, response) = app.put("/api/settings", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["message"], "Request body is required");
    }

    let (status, response) = app
        .send_raw(Method::PUT, "/api/settings", None, r#"{"image_resolution": "4K""#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Failed to parse the request body as JSON"), "{message}");
    let (_, body) = app.get("/api/settings").await;
    assert_eq!(body["data"]["image_resolution"], "2K");
}

#[tokio::test]
async fn reset_restores_defaults() {
    let app = TestApp::new();
    app.put(
        "/api/settings",
        json!({ "max_description_workers": 12, "ai_provider_format": "openai" }),
    )
    .await;

    let (status, body) = app.post("/api/settings/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_description_workers"], 5);
    assert_eq!(body["data"]["ai_provider_format"], "gemini");
}

#[tokio::test]
async fn service_self_tests() {
    let app = TestApp::new();

    let (status, body) = app.post("/api/settings/tests/text-model", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["reply"], "OK");

    let (status, body) = app.post("/api/settings/tests/image-model", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["image_size"], json!([64, 36]));

    let (status, body) = app.post("/api/settings/tests/caption-model", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["caption"], "A blue rectangle on a white background.");
    let models = app.providers.text_models.lock().unwrap().clone();
    assert_eq!(models.last().map(String::as_str), Some("gemini-3-flash-preview"));

    let (status, body) = app.post("/api/settings/tests/baidu-ocr", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Unknown test type");
}

#[tokio::test]
async fn caption_test_uses_the_configured_caption_model() {
    let app = TestApp::new();
    let (status, body) = app
        .put("/api/settings", json!({ "image_caption_model": "caption-lite" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app.post("/api/settings/tests/caption-model", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let models = app.providers.text_models.lock().unwrap().clone();
    assert_eq!(models.last().map(String::as_str), Some("caption-lite"));

    app.providers.text.blank_captions.store(true, Ordering::SeqCst);
    let (status, body) = app.post("/api/settings/tests/caption-model", json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "CAPTION_TEST_FAILED");
}
