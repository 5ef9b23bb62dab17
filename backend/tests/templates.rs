mod common;

use axum::http::StatusCode;
use common::{png_bytes, TestApp};
use serde_json::json;

#[tokio::test]
async fn project_template_upload_and_delete() {
    let app = TestApp::new();
    let id = app.create_project("Templated").await;
    let uri = format!("/api/projects/{id}/template");

    let (status, body) = app.upload(&uri, "template_image", "slide.bmp", b"BM", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Invalid file type. Allowed types: png, jpg, jpeg, gif, webp"
    );

    let (status, body) = app.upload(&uri, "other_field", "slide.png", b"x", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No file uploaded");

    let (status, body) = app
        .upload(&uri, "template_image", "Slide.PNG", &png_bytes(16, 9), &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["data"]["template_image_url"],
        format!("/files/{id}/template/template.png")
    );
    assert!(app.upload_path(&format!("{id}/template/template.png")).is_file());

    let (_, body) = app.get(&format!("/api/projects/{id}")).await;
    assert_eq!(
        body["data"]["template_image_url"],
        format!("/files/{id}/template/template.png")
    );

    let (status, body) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Template deleted successfully");
    assert!(!app.upload_path(&format!("{id}/template")).exists());

    let (status, body) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No template to delete");
}

#[tokio::test]
async fn system_templates_are_empty() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/templates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["templates"], json!([]));
}

#[tokio::test]
async fn user_template_library() {
    let app = TestApp::new();
    let bytes = png_bytes(1200, 675);

    let (status, body) = app
        .upload(
            "/api/user-templates",
            "template_image",
            "brand.png",
            &bytes,
            &[("name", "Brand")],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let template = &body["data"];
    let id = template["id"].as_str().unwrap().to_string();
    assert_eq!(template["name"], "Brand");
    assert_eq!(template["file_size"], bytes.len());
    assert_eq!(
        template["template_image_url"],
        format!("/files/user-templates/{id}/template.png")
    );
    assert_eq!(
        template["thumb_url"],
        format!("/files/user-templates/{id}/template-thumb.webp")
    );
    let thumb = image::open(app.upload_path(&format!("user-templates/{id}/template-thumb.webp")))
        .unwrap();
    assert_eq!(thumb.width(), 600);

    // Not decodable, so no thumbnail, but the upload still succeeds.
    let (status, body) = app
        .upload("/api/user-templates", "template_image", "broken.jpg", b"not an image", &[])
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["thumb_url"], json!(null));

    let (_, body) = app.get("/api/user-templates").await;
    let templates = body["data"]["templates"].as_array().unwrap();
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[1]["id"], id.as_str());

    let (status, _) = app.delete(&format!("/api/user-templates/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.upload_path(&format!("user-templates/{id}")).exists());

    let (status, _) = app.delete(&format!("/api/user-templates/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn materials_generate_list_and_delete() {
    let app = TestApp::new();
    let project = app.create_project("Materials").await;

    let (status, body) = app
        .post("/api/materials/generate", json!({ "prompt": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "prompt is required");

    let (status, body) = app
        .post(
            "/api/materials/generate",
            json!({ "prompt": "A lighthouse", "project_id": project }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let scoped = body["data"]["id"].as_str().unwrap().to_string();
    let url = body["data"]["url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("/files/{project}/materials/material_")), "{url}");

    let (status, body) = app
        .post("/api/materials/generate", json!({ "prompt": "A compass" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["project_id"], json!(null));
    assert!(body["data"]["url"].as_str().unwrap().starts_with("/files/materials/"));

    let (status, _) = app
        .post(
            "/api/materials/generate",
            json!({ "prompt": "A map", "project_id": "missing" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let count = |body: &serde_json::Value| body["data"]["materials"].as_array().unwrap().len();
    let (_, body) = app.get("/api/materials").await;
    assert_eq!(count(&body), 2);
    let (_, body) = app.get("/api/materials?project_id=none").await;
    assert_eq!(count(&body), 1);
    let (_, body) = app.get(&format!("/api/materials?project_id={project}")).await;
    assert_eq!(count(&body), 1);
    assert_eq!(body["data"]["materials"][0]["id"], scoped.as_str());

    let (status, _) = app.delete(&format!("/api/materials/{scoped}")).await;
    assert_eq!(status, StatusCode::OK);
    let relative = url.trim_start_matches("/files/");
    assert!(!app.upload_path(relative).exists());
    let (status, _) = app.delete(&format!("/api/materials/{scoped}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
