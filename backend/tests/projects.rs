mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_requires_the_input_for_its_creation_type() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/projects", json!({ "creation_type": "outline" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"]["message"],
        "outline_text is required for outline projects"
    );

    let (status, body) = app
        .post("/api/projects", json!({ "idea_prompt": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = app
        .post(
            "/api/projects",
            json!({ "creation_type": "idea", "idea_prompt": "Rust in production" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "DRAFT");
    assert_eq!(body["data"]["creation_type"], "idea");
    assert_eq!(body["data"]["pages"], json!([]));
}

#[tokio::test]
async fn malformed_json_uses_the_error_envelope() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/projects")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn project_crud() {
    let app = TestApp::new();
    let first = app.create_project("First deck").await;
    let second = app.create_project("Second deck").await;

    let (status, body) = app.get("/api/projects?limit=500").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|project| project["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.as_str()) && ids.contains(&second.as_str()));

    let (status, body) = app
        .put(
            &format!("/api/projects/{first}"),
            json!({ "extra_requirements": "Keep it short", "template_style": "Minimal" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["extra_requirements"], "Keep it short");
    assert_eq!(body["data"]["template_style"], "Minimal");

    let (_, body) = app
        .put(&format!("/api/projects/{first}"), json!({ "template_style": null }))
        .await;
    assert_eq!(body["data"]["template_style"], json!(null));
    assert_eq!(body["data"]["extra_requirements"], "Keep it short");

    let (status, body) = app.delete(&format!("/api/projects/{first}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Project deleted");

    let (status, body) = app.get(&format!("/api/projects/{first}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Project not found");
}

#[tokio::test]
async fn delete_succeeds_when_files_cannot_be_removed() {
    let app = TestApp::new();
    let id = app.create_project("Stuck files").await;
    // A plain file where the project directory should be makes removal fail.
    std::fs::write(app.upload_path(&id), b"not a directory").unwrap();

    let (status, body) = app.delete(&format!("/api/projects/{id}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Project deleted");

    let (status, _) = app.get(&format!("/api/projects/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn add_page(app: &TestApp, project_id: &str, title: &str, order_index: Option<i64>) -> String {
    let (status, body) = app
        .post(
            &format!("/api/projects/{project_id}/pages"),
            json!({
                "order_index": order_index,
                "outline_content": { "title": title, "points": [] },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn page_titles(app: &TestApp, project_id: &str) -> Vec<(i64, String)> {
    let (_, body) = app.get(&format!("/api/projects/{project_id}")).await;
    body["data"]["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|page| {
            (
                page["order_index"].as_i64().unwrap(),
                page["outline_content"]["title"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn pages_keep_contiguous_order() {
    let app = TestApp::new();
    let project = app.create_project("Ordering").await;

    let a = add_page(&app, &project, "A", None).await;
    let b = add_page(&app, &project, "B", None).await;
    let c = add_page(&app, &project, "C", Some(0)).await;
    assert_eq!(
        page_titles(&app, &project).await,
        vec![(0, "C".into()), (1, "A".into()), (2, "B".into())]
    );

    let (status, _) = app
        .put(
            &format!("/api/projects/{project}"),
            json!({ "pages_order": [b, c, a] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        page_titles(&app, &project).await,
        vec![(0, "B".into()), (1, "C".into()), (2, "A".into())]
    );

    let (status, body) = app
        .put(
            &format!("/api/projects/{project}"),
            json!({ "pages_order": [b, c] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "pages_order must list every page of the project exactly once"
    );

    let (status, _) = app.delete(&format!("/api/projects/{project}/pages/{c}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        page_titles(&app, &project).await,
        vec![(0, "B".into()), (1, "A".into())]
    );

    let (status, _) = app.delete(&format!("/api/projects/{project}/pages/{c}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_content_updates() {
    let app = TestApp::new();
    let project = app.create_project("Editing").await;
    let page = add_page(&app, &project, "Draft", None).await;

    let (status, body) = app
        .put(
            &format!("/api/projects/{project}/pages/{page}/outline"),
            json!({ "outline_content": { "title": "Final", "points": ["x"] }, "part": "Intro" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outline_content"]["title"], "Final");
    assert_eq!(body["data"]["part"], "Intro");
    assert_eq!(body["data"]["status"], "DRAFT");

    let (status, body) = app
        .put(
            &format!("/api/projects/{project}/pages/{page}/description"),
            json!({ "description_content": "Plain text body" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description_content"]["text"], "Plain text body");
    assert_eq!(body["data"]["status"], "DESCRIPTION_GENERATED");

    let (status, body) = app
        .put(
            &format!("/api/projects/{project}/pages/{page}/description"),
            json!({ "description_content": { "text": "Structured body" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description_content"]["text"], "Structured body");

    let (status, _) = app
        .put(
            &format!("/api/projects/{project}/pages/missing/description"),
            json!({ "description_content": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
