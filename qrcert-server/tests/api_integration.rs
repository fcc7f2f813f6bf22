//! API integration tests for qrcert-server.
//!
//! These tests drive the router with realistic multipart requests, using the
//! bundled classifier, the real QR decoder and a counting stub resolver.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcert_core::{
    AllowList, FeatureSchema, MemoryReferenceStore, ModelBundle, UrlResolver, VerificationPipeline,
    VerifyError,
};
use qrcert_server::{create_router, AppState, Config};
use qrcode::QrCode;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const MODEL: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../models/hospital-url-domain-v1.onnx"
);
const REAL_URL: &str = "https://real-hospital.com/certificate/12345";
const SHORT_URL: &str = "https://bit.ly/xyz";
const FAKE_LANDING: &str = "https://fake-hospital.net/cert/1";
const ALLOWED_SHORT_URL: &str = "https://bit.ly/known-good";

/// Resolver stub that counts calls; `None` simulates a timeout.
struct CountingResolver {
    target: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl UrlResolver for CountingResolver {
    async fn resolve(&self, url: &str) -> qrcert_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.target
            .map(str::to_string)
            .ok_or_else(|| VerifyError::Resolution(format!("{url}: timed out")))
    }
}

struct TestApp {
    router: Router,
    resolver: Arc<CountingResolver>,
    shutdown: CancellationToken,
}

impl TestApp {
    fn new(resolves_to: Option<&'static str>, config: Config) -> Self {
        let model = ModelBundle::load(Path::new(MODEL), &FeatureSchema::domain_v1()).unwrap();
        let resolver = Arc::new(CountingResolver {
            target: resolves_to,
            calls: AtomicUsize::new(0),
        });

        let pipeline =
            VerificationPipeline::builder(Arc::new(MemoryReferenceStore::new()), model.classifier())
                .resolver(resolver.clone())
                .allow_list(AllowList::new([ALLOWED_SHORT_URL]))
                .build()
                .unwrap();

        let state = AppState::new(pipeline, &config);
        let shutdown = state.shutdown.clone();
        Self {
            router: create_router(state),
            resolver,
            shutdown,
        }
    }

    fn resolver_calls(&self) -> usize {
        self.resolver.calls.load(Ordering::SeqCst)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn enroll(&self, image: &[u8]) -> (StatusCode, Value) {
        self.send(upload("/enroll", "image", "image/png", image, None))
            .await
    }

    async fn verify(&self, image: &[u8]) -> (StatusCode, Value) {
        self.send(upload("/verify", "image", "image/png", image, None))
            .await
    }
}

fn default_app() -> TestApp {
    TestApp::new(Some(FAKE_LANDING), Config::default())
}

/// Helper to create a multipart upload request
fn upload(
    uri: &str,
    field: &str,
    content_type: &str,
    content: &[u8],
    bearer: Option<&str>,
) -> Request<Body> {
    let boundary = "----TestBoundary7MA4YWxkTrZu0gW";
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"certificate.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");

    // End boundary
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        );
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn qr_png(payload: &str) -> Vec<u8> {
    let code = QrCode::new(payload.as_bytes()).unwrap();
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(240, 240)
        .build();
    png(DynamicImage::ImageLuma8(img))
}

fn blank_png() -> Vec<u8> {
    png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        200,
        200,
        Luma([255]),
    )))
}

fn png(img: DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_reports_enrollment() {
    let app = default_app();

    let (status, json) = app.send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["reference_enrolled"], false);
    assert_eq!(json["model_schema"], "domain-v1");
    assert!(json["version"].is_string());

    app.enroll(&qr_png(REAL_URL)).await;

    let (_, json) = app.send(get("/health")).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["reference_enrolled"], true);
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = default_app();

    let (status, json) = app.send(get("/ready")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = default_app();

    let (status, json) = app.send(get("/api-docs/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/verify"].is_object());
    assert!(json["paths"]["/enroll"].is_object());
}

// ============================================================================
// Enrollment Tests
// ============================================================================

#[tokio::test]
async fn test_enroll_returns_digest() {
    let app = default_app();
    let image = qr_png(REAL_URL);

    let (status, json) = app.enroll(&image).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        json["digest"],
        qrcert_core::ImageDigest::of(&image).to_hex()
    );
}

#[tokio::test]
async fn test_enroll_requires_token_when_configured() {
    let app = TestApp::new(
        Some(FAKE_LANDING),
        Config {
            enroll_token: Some("s3cret".into()),
            ..Default::default()
        },
    );
    let image = qr_png(REAL_URL);

    let (status, json) = app
        .send(upload("/enroll", "image", "image/png", &image, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, _) = app
        .send(upload("/enroll", "image", "image/png", &image, Some("wrong")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(upload("/enroll", "image", "image/png", &image, Some("s3cret")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_enroll_accepts_file_field() {
    let app = default_app();

    let (status, _) = app
        .send(upload("/enroll", "file", "image/png", &qr_png(REAL_URL), None))
        .await;

    assert_eq!(status, StatusCode::CREATED);
}

// ============================================================================
// Verification Tests
// ============================================================================

#[tokio::test]
async fn test_verify_without_reference_is_unverifiable() {
    let app = default_app();

    let (status, json) = app.verify(&qr_png(REAL_URL)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["verdict"], "unverifiable");
    assert_eq!(json["code"], "REFERENCE_NOT_ENROLLED");
}

#[tokio::test]
async fn test_verify_enrolled_real_certificate() {
    let app = default_app();
    let image = qr_png(REAL_URL);
    app.enroll(&image).await;

    let (status, json) = app.verify(&image).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verdict"], "real");
    assert_eq!(json["message"], "Real Hospital URL");
    assert_eq!(json["url"], REAL_URL);
    assert_eq!(json["resolved_url"], REAL_URL);
    assert_eq!(app.resolver_calls(), 0);
}

#[tokio::test]
async fn test_verify_modified_image_is_tampered() {
    let app = default_app();
    let original = qr_png(SHORT_URL);
    app.enroll(&original).await;

    let mut modified = original.clone();
    let last = modified.len() - 1;
    modified[last] ^= 0x01;

    let (status, json) = app.verify(&modified).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verdict"], "tampered");
    assert!(json.get("url").is_none());
    assert_eq!(app.resolver_calls(), 0);
}

#[tokio::test]
async fn test_verify_image_without_qr() {
    let app = default_app();
    let image = blank_png();
    app.enroll(&image).await;

    let (status, json) = app.verify(&image).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["verdict"], "no_qr_found");
    assert_eq!(json["code"], "NO_QR_FOUND");
}

#[tokio::test]
async fn test_verify_shortened_url_resolves_to_fake() {
    let app = default_app();
    let image = qr_png(SHORT_URL);
    app.enroll(&image).await;

    let (status, json) = app.verify(&image).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verdict"], "fake");
    assert_eq!(json["url"], SHORT_URL);
    assert_eq!(json["resolved_url"], FAKE_LANDING);
    assert_eq!(app.resolver_calls(), 1);
}

#[tokio::test]
async fn test_verify_resolution_failure() {
    let app = TestApp::new(None, Config::default());
    let image = qr_png(SHORT_URL);
    app.enroll(&image).await;

    let (status, json) = app.verify(&image).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["verdict"], "resolution_failed");
    assert_eq!(json["url"], SHORT_URL);
    assert_eq!(json["code"], "RESOLUTION_FAILED");
    assert_eq!(app.resolver_calls(), 1);
}

#[tokio::test]
async fn test_verify_allow_listed_url_skips_resolution() {
    let app = default_app();
    let image = qr_png(ALLOWED_SHORT_URL);
    app.enroll(&image).await;

    let (status, json) = app.verify(&image).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verdict"], "real");
    assert_eq!(app.resolver_calls(), 0);
}

#[tokio::test]
async fn test_verify_is_repeatable() {
    let app = default_app();
    let image = qr_png(SHORT_URL);
    app.enroll(&image).await;

    let first = app.verify(&image).await;
    let second = app.verify(&image).await;

    assert_eq!(first, second);
}

// ============================================================================
// Upload Validation Tests
// ============================================================================

#[tokio::test]
async fn test_verify_missing_image_field() {
    let app = default_app();

    let (status, json) = app
        .send(upload("/verify", "attachment", "image/png", b"abc", None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_verify_rejects_non_image_content_type() {
    let app = default_app();

    let (status, json) = app
        .send(upload("/verify", "image", "text/html", b"<html></html>", None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("Unsupported Content-Type"));
}

#[tokio::test]
async fn test_uploads_refused_while_shutting_down() {
    let app = default_app();
    app.shutdown.cancel();

    let (status, json) = app.verify(&qr_png(REAL_URL)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");

    let (status, _) = app.enroll(&qr_png(REAL_URL)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_multi_megabyte_photo_reaches_pipeline() {
    let app = default_app();
    let enrolled = vec![0x5a; 3 * 1024 * 1024];
    let mut retaken = enrolled.clone();
    retaken[0] = 0x00;

    let (status, json) = app.enroll(&enrolled).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["digest"].as_str().unwrap().len(), 64);

    let (status, json) = app.verify(&retaken).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verdict"], "tampered");
}

#[tokio::test]
async fn test_upload_over_file_size_limit_rejected() {
    let app = default_app();
    let oversized = vec![0x5a; 11 * 1024 * 1024];

    let (status, json) = app.verify(&oversized).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert!(json["error"].as_str().unwrap().contains("limit is 10 MB"));
}

#[tokio::test]
async fn test_uploads_archived_when_configured() {
    let temp = tempfile::tempdir().unwrap();
    let app = TestApp::new(
        Some(FAKE_LANDING),
        Config {
            upload_dir: Some(temp.path().to_path_buf()),
            ..Default::default()
        },
    );
    let image = qr_png(REAL_URL);
    app.enroll(&image).await;
    app.verify(&image).await;

    let archived: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(archived.len(), 2);
    for path in archived {
        assert_eq!(std::fs::read(path).unwrap(), image);
    }
}
