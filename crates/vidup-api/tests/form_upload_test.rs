//! Single-request multipart upload integration tests.
//!
//! Run with: `cargo test -p vidup-api --test form_upload_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{setup_test_app, setup_test_app_without_remote};

fn video_form(file_name: &str, data: &'static [u8]) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from_static(data))
        .file_name(file_name.to_string())
        .mime_type("video/mp4");
    MultipartForm::new().add_part("file", part)
}

#[tokio::test]
async fn test_form_upload_to_local_storage() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/video/upload/form-data/local")
        .multipart(video_form("trip.mp4", b"local video"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Video uploaded successfully");
    assert_eq!(body["location"]["backend"], "local");

    let name = body["fileName"].as_str().unwrap();
    assert!(name.ends_with(".mp4"));
    assert_eq!(std::fs::read(app.video_path(name)).unwrap(), b"local video");
    assert_eq!(app.chunk_store_entries(), 0);
}

#[tokio::test]
async fn test_form_upload_to_remote_storage() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/video/upload/form-data/s3")
        .multipart(video_form("trip.mp4", b"remote video"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Video uploaded to S3 successfully");
    assert_eq!(body["location"]["bucket"], helpers::TEST_BUCKET);

    let name = body["fileName"].as_str().unwrap();
    assert_eq!(&app.remote_object(name).await[..], b"remote video");
    assert_eq!(app.connector.calls(), 1);
}

#[tokio::test]
async fn test_form_upload_to_unconfigured_remote_fails() {
    let app = setup_test_app_without_remote().await;

    let response = app
        .client()
        .post("/video/upload/form-data/s3")
        .multipart(video_form("trip.mp4", b"remote video"))
        .await;

    assert_eq!(response.status_code(), 500);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
    assert_eq!(app.connector.calls(), 0);
    assert_eq!(app.chunk_store_entries(), 0);
}

#[tokio::test]
async fn test_form_upload_without_file_field() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("title", "no video here");
    let response = app
        .client()
        .post("/video/upload/form-data/local")
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "No file was uploaded.");
}

#[tokio::test]
async fn test_health_reports_storage() {
    let app = setup_test_app_without_remote().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["remote_storage"], "not_configured");
}

#[tokio::test]
async fn test_openapi_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert!(body["paths"]["/videos/{id}"].is_object());
}
