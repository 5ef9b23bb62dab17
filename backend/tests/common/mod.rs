//! Shared harness for the HTTP tests: an in-memory database, a temporary
//! upload folder and in-process fakes for the AI and identity providers.

#![allow(dead_code)]

use adapters::{
    AdapterError, AdapterResult, GeneratedImage, IdentityProvider, IdentityUser, ImageProvider,
    ImageRequest, ProviderConfig, ReferenceImage, TextProvider,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use backend::config::Config;
use backend::database::Database;
use backend::services::ai_registry::ProviderFactory;
use backend::AppState;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const OUTLINE_JSON: &str = r#"[
    {"title": "Welcome", "points": ["Who we are"]},
    {"part": "Body", "pages": [
        {"title": "Details", "points": ["First", "Second"]},
        {"title": "Summary", "points": []}
    ]}
]"#;

pub const PAGE_DESCRIPTION: &str = "Title: Slide\n\nBody text for the slide.";

/// Answers by prompt shape: outline prompts get `OUTLINE_JSON`, per-page
/// list prompts get a JSON array, everything else plain text.
#[derive(Default)]
pub struct FakeText {
    pub calls: AtomicUsize,
    pub blank_captions: AtomicBool,
}

#[async_trait]
impl TextProvider for FakeText {
    fn model(&self) -> &str {
        "fake-text"
    }

    async fn generate_text(&self, prompt: &str, _thinking_budget: u32) -> AdapterResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("Reply with OK only.") {
            return Ok(" OK \n".to_string());
        }
        if prompt.contains("Return a JSON array of strings") {
            return Ok(r#"["Refined one", "Refined two", "Refined three"]"#.to_string());
        }
        if prompt.contains("Return a JSON array only") {
            return Ok(format!("```json\n{OUTLINE_JSON}\n```"));
        }
        Ok(PAGE_DESCRIPTION.to_string())
    }

    async fn generate_with_image(
        &self,
        _prompt: &str,
        image: &ReferenceImage,
        _thinking_budget: u32,
    ) -> AdapterResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.mime_type != "image/png" || image::load_from_memory(&image.bytes).is_err() {
            return Err(AdapterError::InvalidResponse {
                provider: "fake",
                message: "unreadable image".to_string(),
            });
        }
        if self.blank_captions.load(Ordering::SeqCst) {
            return Ok("  \n".to_string());
        }
        Ok(" A blue rectangle on a white background. ".to_string())
    }
}

/// Returns a small solid PNG, or fails every call when `fail` is set.
#[derive(Default)]
pub struct FakeImage {
    pub fail: bool,
    pub calls: AtomicUsize,
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 90, 200])));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encode png");
    buffer.into_inner()
}

#[async_trait]
impl ImageProvider for FakeImage {
    async fn generate_image(&self, _request: &ImageRequest) -> AdapterResult<GeneratedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdapterError::NoImage("fake"));
        }
        Ok(GeneratedImage {
            bytes: png_bytes(64, 36),
            mime_type: Some("image/png".to_string()),
        })
    }
}

pub struct FakeProviders {
    pub text: Arc<FakeText>,
    pub image: Arc<FakeImage>,
    /// `text_model` of every text provider requested, in order.
    pub text_models: Mutex<Vec<String>>,
}

impl FakeProviders {
    pub fn new(fail_images: bool) -> Self {
        Self {
            text: Arc::new(FakeText::default()),
            image: Arc::new(FakeImage {
                fail: fail_images,
                ..FakeImage::default()
            }),
            text_models: Mutex::new(Vec::new()),
        }
    }
}

impl ProviderFactory for FakeProviders {
    fn text(&self, config: &ProviderConfig) -> AdapterResult<Arc<dyn TextProvider>> {
        self.text_models
            .lock()
            .expect("text models")
            .push(config.text_model.clone());
        let text: Arc<dyn TextProvider> = self.text.clone();
        Ok(text)
    }

    fn image(&self, _config: &ProviderConfig) -> AdapterResult<Arc<dyn ImageProvider>> {
        let image: Arc<dyn ImageProvider> = self.image.clone();
        Ok(image)
    }
}

/// Tokens are `<name>-token`; the user is `<name>@example.com`.
/// `expired` and anything else without the suffix are rejected.
pub struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_token(&self, token: &str) -> AdapterResult<IdentityUser> {
        if token == "expired" {
            return Err(AdapterError::TokenExpired);
        }
        let name = token
            .strip_suffix("-token")
            .ok_or_else(|| AdapterError::InvalidToken("Signature verification failed".into()))?;
        Ok(IdentityUser {
            id: format!("user-{name}"),
            email: format!("{name}@example.com"),
            role: "authenticated".to_string(),
            display_name: Some(name.to_string()),
            avatar_url: None,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub providers: Arc<FakeProviders>,
    _uploads: TempDir,
}

#[derive(Default)]
pub struct TestOptions {
    pub auth: bool,
    pub fail_images: bool,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(TestOptions::default())
    }

    pub fn with_auth() -> Self {
        Self::with(TestOptions {
            auth: true,
            ..TestOptions::default()
        })
    }

    pub fn with(options: TestOptions) -> Self {
        let uploads = TempDir::new().expect("temp dir");
        let mut config = Config {
            upload_folder: uploads.path().to_path_buf(),
            google_api_key: "test-key".to_string(),
            admin_emails: vec!["admin@example.com".to_string()],
            ..Config::default()
        };
        let identity: Option<Arc<dyn IdentityProvider>> = if options.auth {
            config.supabase_url = "https://identity.test".to_string();
            config.supabase_jwt_secret = "secret".to_string();
            Some(Arc::new(FakeIdentity))
        } else {
            None
        };

        let db = Database::open_in_memory().expect("in-memory database");
        let providers = Arc::new(FakeProviders::new(options.fail_images));
        let factory: Arc<dyn ProviderFactory> = providers.clone();
        let state = AppState::new(config, db, identity, factory);
        Self {
            router: backend::app(state.clone()),
            state,
            providers,
            _uploads: uploads,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    /// Sends `raw` as a JSON body without checking that it parses.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        raw: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(raw.to_string())).expect("request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, None, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, None, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, None).await
    }

    /// Multipart upload with one file field and optional text fields.
    pub async fn upload(
        &self,
        uri: &str,
        field: &str,
        filename: &str,
        bytes: &[u8],
        text_fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let boundary = "slidecraft-test-boundary";
        let mut body = Vec::new();
        for (name, value) in text_fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    /// Creates an idea project and returns its id.
    pub async fn create_project(&self, idea: &str) -> String {
        let (status, body) = self
            .post(
                "/api/projects",
                serde_json::json!({ "creation_type": "idea", "idea_prompt": idea }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["id"].as_str().expect("project id").to_string()
    }

    /// Polls a task until it reaches a terminal status.
    pub async fn wait_for_task(&self, project_id: &str, task_id: &str) -> Value {
        let uri = format!("/api/projects/{project_id}/tasks/{task_id}");
        for _ in 0..200 {
            let (status, body) = self.get(&uri).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            let task = body["data"].clone();
            if matches!(task["status"].as_str(), Some("COMPLETED" | "FAILED")) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task {task_id} did not finish");
    }

    pub fn upload_path(&self, relative: &str) -> std::path::PathBuf {
        self.state.files.upload_folder().join(relative)
    }
}
