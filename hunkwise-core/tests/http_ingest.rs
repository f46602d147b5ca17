//! HTTP ingest endpoint: router via `oneshot`, plus one real loopback bind.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use hunkwise_core::clock::SystemClock;
use hunkwise_core::http::{self, HttpServer, MAX_BODY_BYTES};
use hunkwise_core::ingest::{IngestService, Validation};
use hunkwise_core::paths;
use hunkwise_core::store::ReviewStore;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn setup(validation: Validation) -> (tempfile::TempDir, IngestService, Router) {
    let store_dir = tempfile::tempdir().unwrap();
    let ingest = IngestService::new(ReviewStore::new(store_dir.path()), Arc::new(SystemClock));
    let router = http::router(ingest.clone(), validation);
    (store_dir, ingest, router)
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/review")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

const DEMO: &str = r#"{"workingDirectory":"/tmp/proj","title":"Demo","sections":[{"id":"s1","narrative":"Add greeting","hunks":[{"file":"main.x","startLine":10,"diff":"@@ -10,1 +10,2 @@\n line\n+hi","importance":"low"}]}]}"#;

#[tokio::test]
async fn simple_review_round_trips() {
    let (_store_dir, ingest, router) = setup(Validation::Lenient);

    let response = router.oneshot(post(DEMO)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    let stored = ingest.store().read("/tmp/proj").await.unwrap();
    assert_eq!(stored.working_directory, paths::canonicalize("/tmp/proj").unwrap());
    assert_eq!(stored.title, "Demo");
    assert_eq!(stored.sections[0].id, "s1");
    assert_eq!(stored.sections[0].narrative, "Add greeting");
    let hunk = &stored.sections[0].hunks[0];
    assert_eq!(hunk.file, "main.x");
    assert_eq!(hunk.start_line, 10);
    assert_eq!(hunk.diff, "@@ -10,1 +10,2 @@\n line\n+hi");
    assert_eq!(hunk.importance, "low");
    assert!(stored.created_at.is_some());
}

#[tokio::test]
async fn oversized_body_is_rejected_without_writing() {
    let (store_dir, _ingest, router) = setup(Validation::Lenient);

    let mut body = Vec::with_capacity(11 * 1024 * 1024);
    body.extend_from_slice(br#"{"workingDirectory":"/tmp/proj","title":""#);
    body.resize(11 * 1024 * 1024 - 3, b'x');
    body.extend_from_slice(br#"","sections":[]}"#);
    assert!(body.len() > MAX_BODY_BYTES);

    let response = router.oneshot(post(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let files = std::fs::read_dir(store_dir.path()).unwrap().count();
    assert_eq!(files, 0, "nothing may be written for a rejected body");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let (_store_dir, _ingest, router) = setup(Validation::Lenient);
    let request = Request::builder().method(Method::GET).uri("/review").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_json_is_400_with_parser_message() {
    let (_store_dir, _ingest, router) = setup(Validation::Lenient);
    let response = router.oneshot(post("{\"workingDirectory\": ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("EOF"), "parser message expected, got {text:?}");
}

#[tokio::test]
async fn missing_working_directory_is_400() {
    let (_store_dir, _ingest, router) = setup(Validation::Lenient);
    let response = router.oneshot(post(r#"{"title":"x","sections":[]}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strict_http_rejects_unknown_importance() {
    let payload = DEMO.replace("\"low\"", "\"urgent\"");

    let (_d, _i, lenient) = setup(Validation::Lenient);
    assert_eq!(lenient.oneshot(post(payload.clone())).await.unwrap().status(), StatusCode::OK);

    let (_d, _i, strict) = setup(Validation::Strict);
    assert_eq!(strict.oneshot(post(payload)).await.unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_section_ids_are_400() {
    let payload = DEMO.replace(
        r#""sections":["#,
        r#""sections":[{"id":"s1","narrative":"first","hunks":[]},"#,
    );
    let (store_dir, _ingest, router) = setup(Validation::Lenient);
    assert_eq!(router.oneshot(post(payload)).await.unwrap().status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read_dir(store_dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn store_failure_is_500() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    // The store base is a regular file, so creating it as a directory fails.
    let ingest = IngestService::new(ReviewStore::new(blocker.path()), Arc::new(SystemClock));
    let router = http::router(ingest, Validation::Lenient);
    let response = router.oneshot(post(DEMO)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn real_bind_reports_port_and_drains_on_shutdown() {
    let (_store_dir, ingest, router) = setup(Validation::Lenient);
    let server = HttpServer::bind(0, router).await.unwrap();
    let port = server.port();
    assert_ne!(port, 0);
    assert!(server.local_addr().ip().is_loopback());

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.serve(shutdown.clone()));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{port}/review"))
        .header("content-type", "application/json")
        .body(DEMO)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(ingest.store().read("/tmp/proj").await.unwrap().title, "Demo");

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("server drains promptly")
        .unwrap()
        .unwrap();
}
