//! Integration tests for the API server.

use std::sync::OnceLock;

use asset_store::{AssetStoreError, InMemoryAssetStore, StoreId};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use record_store::{InMemoryRecordStore, RecordStoreError};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const BOUNDARY: &str = "X-INGEST-BOUNDARY";
const OWNER: &str = "6f1c2a5e-8c1d-4b7e-9a57-3f0d2b9e4c11";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    assets: InMemoryAssetStore,
    records: InMemoryRecordStore,
    shutdown: CancellationToken,
    upload_dir: tempfile::TempDir,
}

impl TestApp {
    fn new() -> Self {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        let upload_dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let state = api::create_default_state(
            assets.clone(),
            records.clone(),
            upload_dir.path(),
            shutdown.clone(),
        );
        let app = api::create_app(state, get_metrics_handle(), 10 * 1024 * 1024);

        Self {
            app,
            assets,
            records,
            shutdown,
            upload_dir,
        }
    }

    fn spooled_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }

    async fn upload(&self, owner: Option<&str>, parts: &[Part]) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/videos")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(owner) = owner {
            request = request.header("x-user-id", owner);
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::from(multipart_body(parts))).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }
}

enum Part {
    Text(&'static str, &'static str),
    File(&'static str, &'static str, &'static [u8]),
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn full_upload() -> Vec<Part> {
    vec![
        Part::Text("title", "x"),
        Part::Text("description", "y"),
        Part::File("videoFile", "a.mp4", b"primary video bytes"),
        Part::File("thumbnail", "b.jpg", b"thumbnail bytes"),
    ]
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().app;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().app;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_upload_committed() {
    let app = TestApp::new();

    let (status, body) = app.upload(Some(OWNER), &full_upload()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Video uploaded successfully.");
    assert_eq!(body["data"]["title"], "x");
    assert_eq!(body["data"]["description"], "y");
    assert_eq!(body["data"]["owner"], OWNER);
    assert_eq!(body["data"]["is_published"], true);
    assert_eq!(body["data"]["primary"]["store_id"], "asset-0001");
    assert_eq!(body["data"]["secondary"]["store_id"], "asset-0002");
    assert_eq!(app.records.record_count().await, 1);
    assert_eq!(app.spooled_files(), 0);

    let spooled = app.assets.store_calls().await;
    assert!(spooled[0].to_string_lossy().ends_with(".mp4"));
    assert!(spooled[1].to_string_lossy().ends_with(".jpg"));
}

#[tokio::test]
async fn test_upload_requires_owner() {
    let app = TestApp::new();

    let (status, body) = app.upload(None, &full_upload()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized request");

    let (status, _) = app.upload(Some("not-a-uuid"), &full_upload()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app.assets.store_calls().await.is_empty());
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn test_upload_blank_title_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .upload(
            Some(OWNER),
            &[
                Part::Text("title", "   "),
                Part::Text("description", "y"),
                Part::File("videoFile", "a.mp4", b"v"),
                Part::File("thumbnail", "b.jpg", b"t"),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Title and description are required and cannot be empty."
    );
    assert!(app.assets.store_calls().await.is_empty());
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn test_upload_missing_thumbnail_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .upload(
            Some(OWNER),
            &[
                Part::Text("title", "x"),
                Part::Text("description", "y"),
                Part::File("videoFile", "a.mp4", b"v"),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Thumbnail file is required.");
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn test_upload_empty_file_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .upload(
            Some(OWNER),
            &[
                Part::Text("title", "x"),
                Part::Text("description", "y"),
                Part::File("videoFile", "a.mp4", b""),
                Part::File("thumbnail", "b.jpg", b"t"),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Uploaded files must not be empty.");
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn test_upload_thumbnail_store_failure() {
    let app = TestApp::new();
    app.assets
        .fail_store_on_call(2, AssetStoreError::Rejected("bad format".into()))
        .await;

    let (status, body) = app.upload(Some(OWNER), &full_upload()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to upload thumbnail. Please try again.");
    assert_eq!(body["reason"], "secondary_store_failed");
    assert!(body.get("requires_reconciliation").is_none());
    assert_eq!(app.assets.delete_calls().await, vec![StoreId::new("asset-0001")]);
    assert_eq!(app.assets.object_count().await, 0);
    assert_eq!(app.spooled_files(), 0);
}

#[tokio::test]
async fn test_upload_commit_failure_with_orphan() {
    let app = TestApp::new();
    app.records
        .set_fail_on_create(Some(RecordStoreError::Unavailable("db down".into())))
        .await;
    app.assets
        .fail_delete_of(
            &StoreId::new("asset-0001"),
            AssetStoreError::Unreachable("store down".into()),
        )
        .await;

    let (status, body) = app.upload(Some(OWNER), &full_upload()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        "Failed to save video details to the database. Please try again."
    );
    assert_eq!(body["requires_reconciliation"], true);
    assert_eq!(body["orphans"], serde_json::json!(["asset-0001"]));
    assert_eq!(
        app.assets.delete_calls().await,
        vec![StoreId::new("asset-0002"), StoreId::new("asset-0001")]
    );
}

#[tokio::test]
async fn test_upload_during_shutdown_is_cancelled() {
    let app = TestApp::new();
    app.shutdown.cancel();

    let (status, body) = app.upload(Some(OWNER), &full_upload()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Upload was cancelled before completion.");
    assert!(app.assets.store_calls().await.is_empty());
    assert_eq!(app.spooled_files(), 0);
}
