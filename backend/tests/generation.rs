mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, TestOptions, PAGE_DESCRIPTION};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

async fn generate_outline(app: &TestApp, project: &str) -> Vec<Value> {
    let (status, body) = app
        .post(&format!("/api/projects/{project}/generate/outline"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["pages"].as_array().unwrap().clone()
}

async fn start_task(app: &TestApp, uri: &str, body: Value) -> String {
    let (status, body) = app.post(uri, body).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["data"]["status"], "PENDING");
    body["data"]["task_id"].as_str().unwrap().to_string()
}

async fn project(app: &TestApp, id: &str) -> Value {
    let (_, body) = app.get(&format!("/api/projects/{id}")).await;
    body["data"].clone()
}

#[tokio::test]
async fn outline_flattens_parts_into_pages() {
    let app = TestApp::new();
    let id = app.create_project("Quarterly review").await;

    let pages = generate_outline(&app, &id).await;
    let titles: Vec<&str> = pages
        .iter()
        .map(|page| page["outline_content"]["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Welcome", "Details", "Summary"]);
    assert_eq!(pages[0]["part"], Value::Null);
    assert_eq!(pages[1]["part"], "Body");
    assert_eq!(pages[2]["order_index"], 2);
    assert_eq!(project(&app, &id).await["status"], "OUTLINE_GENERATED");

    // Regenerating replaces the pages instead of appending.
    let pages = generate_outline(&app, &id).await;
    assert_eq!(pages.len(), 3);
    assert_eq!(project(&app, &id).await["pages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn description_projects_get_descriptions_with_the_outline() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/projects",
            json!({ "creation_type": "descriptions", "description_text": "Page one. Page two. Page three." }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let pages = generate_outline(&app, &id).await;
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0]["description_content"]["text"], "Refined one");
    assert_eq!(pages[2]["status"], "DESCRIPTION_GENERATED");
    assert_eq!(project(&app, &id).await["status"], "DESCRIPTIONS_GENERATED");
}

#[tokio::test]
async fn description_task_reports_progress() {
    let app = TestApp::new();
    let id = app.create_project("Team offsite").await;

    let (status, body) = app
        .post(&format!("/api/projects/{id}/generate/descriptions"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Project has no pages. Generate an outline first"
    );

    generate_outline(&app, &id).await;
    let task_id = start_task(&app, &format!("/api/projects/{id}/generate/descriptions"), json!({})).await;
    let task = app.wait_for_task(&id, &task_id).await;
    assert_eq!(task["status"], "COMPLETED");
    assert_eq!(task["task_type"], "GENERATE_DESCRIPTIONS");
    assert_eq!(task["progress"], json!({ "total": 3, "completed": 3, "failed": 0 }));
    assert!(task["completed_at"].is_string());

    let project = project(&app, &id).await;
    assert_eq!(project["status"], "DESCRIPTIONS_GENERATED");
    for page in project["pages"].as_array().unwrap() {
        assert_eq!(page["status"], "DESCRIPTION_GENERATED");
        assert_eq!(page["description_content"]["text"], PAGE_DESCRIPTION);
    }

    let (status, _) = app
        .get(&format!("/api/projects/{id}/tasks/not-a-task"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refine_keeps_descriptions_of_matching_titles() {
    let app = TestApp::new();
    let id = app.create_project("Refinement").await;
    let pages = generate_outline(&app, &id).await;
    let first = pages[0]["id"].as_str().unwrap();

    let (status, body) = app
        .put(
            &format!("/api/projects/{id}/pages/{first}/description"),
            json!({ "description_content": "Kept text" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app
        .post(&format!("/api/projects/{id}/refine/outline"), json!({ "user_requirement": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "user_requirement is required");

    let (status, body) = app
        .post(
            &format!("/api/projects/{id}/refine/outline"),
            json!({ "user_requirement": "Add more detail", "previous_requirements": ["Shorter"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let pages = body["data"]["pages"].as_array().unwrap();
    assert_eq!(pages[0]["outline_content"]["title"], "Welcome");
    assert_eq!(pages[0]["description_content"]["text"], "Kept text");
    assert_eq!(pages[1]["description_content"], Value::Null);

    let (status, body) = app
        .post(
            &format!("/api/projects/{id}/refine/descriptions"),
            json!({ "user_requirement": "More formal" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let texts: Vec<&str> = body["data"]["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|page| page["description_content"]["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["Refined one", "Refined two", "Refined three"]);
}

async fn described_project(app: &TestApp) -> (String, Vec<Value>) {
    let id = app.create_project("Image deck").await;
    generate_outline(app, &id).await;
    let task_id = start_task(app, &format!("/api/projects/{id}/generate/descriptions"), json!({})).await;
    app.wait_for_task(&id, &task_id).await;
    let pages = project(app, &id).await["pages"].as_array().unwrap().clone();
    (id, pages)
}

#[tokio::test]
async fn images_require_descriptions() {
    let app = TestApp::new();
    let id = app.create_project("No descriptions").await;
    generate_outline(&app, &id).await;

    let (status, body) = app
        .post(&format!("/api/projects/{id}/generate/images"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Page 1 has no description");
}

#[tokio::test]
async fn malformed_image_requests_start_nothing() {
    let app = TestApp::new();
    let (id, _) = described_project(&app).await;
    let uri = format!("/api/projects/{id}/generate/images");

    for raw in [r#"{"page_ids": "not-a-list""#, r#"{"page_ids": "not-a-list"}"#] {
        let (status, body) = app.send_raw(Method::POST, &uri, None, raw).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["success"], false);
    }
    assert_eq!(app.providers.image.calls.load(Ordering::SeqCst), 0);
    let project = project(&app, &id).await;
    assert_eq!(project["status"], "DESCRIPTIONS_GENERATED");
    for page in project["pages"].as_array().unwrap() {
        assert_eq!(page["status"], "DESCRIPTION_GENERATED");
    }

    // An empty body still means every page.
    let (status, body) = app.send_raw(Method::POST, &uri, None, "").await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["data"]["total"], 3);
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();
    app.wait_for_task(&id, &task_id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_page_images_get_distinct_versions() {
    let app = TestApp::new();
    let (id, pages) = described_project(&app).await;
    let page_id = pages[0]["id"].as_str().unwrap();
    let uri = format!("/api/projects/{id}/pages/{page_id}/generate/image");

    let (first, second) = tokio::join!(
        start_task(&app, &uri, json!({})),
        start_task(&app, &uri, json!({}))
    );
    for task_id in [first, second] {
        let task = app.wait_for_task(&id, &task_id).await;
        assert_eq!(task["status"], "COMPLETED", "{task}");
    }

    let (_, body) = app
        .get(&format!("/api/projects/{id}/pages/{page_id}/image-versions"))
        .await;
    let versions = body["data"]["versions"].as_array().unwrap();
    let numbers: Vec<i64> = versions
        .iter()
        .map(|version| version["version_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, [2, 1]);
    assert_eq!(versions.iter().filter(|v| v["is_current"] == true).count(), 1);
    for n in [1, 2] {
        assert!(app.upload_path(&format!("{id}/pages/{page_id}_v{n}.png")).is_file());
    }
    assert_eq!(project(&app, &id).await["pages"][0]["status"], "COMPLETED");
}

#[tokio::test]
async fn image_generation_creates_versions() {
    let app = TestApp::new();
    let (id, pages) = described_project(&app).await;

    let task_id = start_task(&app, &format!("/api/projects/{id}/generate/images"), Value::Null).await;
    let task = app.wait_for_task(&id, &task_id).await;
    assert_eq!(task["status"], "COMPLETED");
    assert_eq!(task["progress"]["completed"], 3);

    let current = project(&app, &id).await;
    assert_eq!(current["status"], "COMPLETED");
    let page_id = pages[0]["id"].as_str().unwrap().to_string();
    let first_url = current["pages"][0]["generated_image_url"].as_str().unwrap().to_string();
    assert!(first_url.ends_with("_v1_thumb.jpg"), "{first_url}");
    assert!(app.upload_path(&format!("{id}/pages/{page_id}_v1.png")).is_file());

    let (status, _) = app.get(&first_url).await;
    assert_eq!(status, StatusCode::OK);

    let task_id = start_task(
        &app,
        &format!("/api/projects/{id}/pages/{page_id}/generate/image"),
        json!({}),
    )
    .await;
    let task = app.wait_for_task(&id, &task_id).await;
    assert_eq!(task["progress"]["total"], 1);

    let versions_uri = format!("/api/projects/{id}/pages/{page_id}/image-versions");
    let (status, body) = app.get(&versions_uri).await;
    assert_eq!(status, StatusCode::OK);
    let versions = body["data"]["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version_number"], 2);
    assert_eq!(versions[0]["is_current"], true);
    assert_eq!(versions[1]["is_current"], false);

    let old = versions[1]["id"].as_str().unwrap();
    let (status, body) = app
        .post(&format!("{versions_uri}/{old}/set-current"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["generated_image_url"], first_url);
    let current: Vec<bool> = body["data"]["image_versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|version| version["is_current"].as_bool().unwrap())
        .collect();
    assert_eq!(current, [false, true]);

    let (status, body) = app
        .post(&format!("{versions_uri}/unknown/set-current"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Image version not found");
}

#[tokio::test]
async fn edit_adds_a_version() {
    let app = TestApp::new();
    let (id, pages) = described_project(&app).await;
    let page_id = pages[1]["id"].as_str().unwrap();
    let edit_uri = format!("/api/projects/{id}/pages/{page_id}/edit/image");

    let (status, body) = app.post(&edit_uri, json!({ "edit_instruction": "Bigger title" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Page has no image to edit");

    let task_id = start_task(
        &app,
        &format!("/api/projects/{id}/pages/{page_id}/generate/image"),
        json!({}),
    )
    .await;
    app.wait_for_task(&id, &task_id).await;

    let (status, _) = app.post(&edit_uri, json!({ "edit_instruction": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let task_id = start_task(&app, &edit_uri, json!({ "edit_instruction": "Bigger title" })).await;
    let task = app.wait_for_task(&id, &task_id).await;
    assert_eq!(task["task_type"], "EDIT_IMAGE");
    assert_eq!(task["status"], "COMPLETED");

    let (_, body) = app
        .get(&format!("/api/projects/{id}/pages/{page_id}/image-versions"))
        .await;
    assert_eq!(body["data"]["versions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_images_fail_the_task() {
    let app = TestApp::with(TestOptions {
        fail_images: true,
        ..TestOptions::default()
    });
    let (id, _) = described_project(&app).await;

    let task_id = start_task(&app, &format!("/api/projects/{id}/generate/images"), json!({})).await;
    let task = app.wait_for_task(&id, &task_id).await;
    assert_eq!(task["status"], "FAILED");
    assert_eq!(task["progress"]["failed"], 3);
    assert!(task["error_message"].is_string());
    assert_eq!(app.providers.image.calls.load(Ordering::SeqCst), 3);

    let project = project(&app, &id).await;
    for page in project["pages"].as_array().unwrap() {
        assert_eq!(page["status"], "FAILED");
        assert_eq!(page["generated_image_url"], Value::Null);
    }
}
