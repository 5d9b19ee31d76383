//! Integration tests for the fragment endpoint
//!
//! Drives the full router: endpoint match, nonce check, resolution, rendering
//! and signaling headers.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use hyperfrag::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct Site {
    defaults: TempDir,
    namespace: TempDir,
}

impl Site {
    fn new() -> Self {
        let site = Self {
            defaults: TempDir::new().unwrap(),
            namespace: TempDir::new().unwrap(),
        };
        write(site.defaults.path(), "datastar-demo.hm.php", "<p>demo {{ compat_mode }}</p>");
        write(
            site.namespace.path(),
            "foo/bar.hm.php",
            "<p>ns bar {{ hmvals.a }} {{ hmvals.b | join(\",\") }}</p>",
        );
        write(
            site.defaults.path(),
            "save.hm.php",
            r#"{% if hmvals %}{{ hm_response("save", "success", {"a": hmvals.a}) }}{% else %}{{ hm_response("save", "error", {"reason": "empty"}) }}{% endif %}"#,
        );
        write(
            site.defaults.path(),
            "deny.hm.php",
            r#"{{ hm_die("Not allowed") }}"#,
        );
        write(site.defaults.path(), "old.htmx.php", "legacy {{ hxvals.x }}");
        site
    }

    fn config(&self, with_namespace: bool) -> HyperfragConfig {
        let mut config = HyperfragConfig::default();
        config.templates.default_dirs = vec![self.defaults.path().to_path_buf()];
        if with_namespace {
            config
                .templates
                .namespaces
                .insert("ns".to_string(), self.namespace.path().to_path_buf());
        }
        config.security.nonce_secret = Some(SECRET.to_string());
        config
    }

    fn app(&self, with_namespace: bool) -> (Router, AppState) {
        let state = AppState::from_config(self.config(with_namespace)).unwrap();
        (hyperfrag::server::router(state.clone()), state)
    }
}

fn write(dir: &Path, relative: &str, body: &str) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

fn header_json(headers: &HeaderMap, name: &str) -> Option<Value> {
    headers
        .get(name)
        .map(|value| serde_json::from_str(value.to_str().unwrap()).unwrap())
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_get_default_template() {
    let site = Site::new();
    let (app, _) = site.app(false);

    let request = Request::get("/wp-html/v1/datastar-demo")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>demo current</p>");
    assert!(headers.get("x-hypermedia-error").is_none());
}

#[tokio::test]
async fn test_post_namespaced_with_dot_segments() {
    let site = Site::new();
    let (app, state) = site.app(true);
    let token = state.issue_nonce(CompatibilityMode::Current);

    let request = form_post(
        "/wp-html/v1/ns:foo/../bar",
        &format!("_token={token}&a=ok&b%5B%5D=%3Cx%3E&b%5B%5D=y"),
    );
    let (status, _, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>ns bar ok ,y</p>");
}

#[tokio::test]
async fn test_post_unregistered_namespace_is_404() {
    let site = Site::new();
    // default dir also holds foo/bar, it must not be used as a fallback
    write(site.defaults.path(), "foo/bar.hm.php", "wrong directory");
    let (app, state) = site.app(false);
    let token = state.issue_nonce(CompatibilityMode::Current);

    let request = form_post("/wp-html/v1/ns:foo/../bar", &format!("_token={token}"));
    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
    assert_eq!(
        header_json(&headers, "x-hypermedia-error"),
        Some(json!({ "status": "error", "data": { "message": "Template not found" } }))
    );
}

#[tokio::test]
async fn test_post_without_nonce_is_403() {
    let site = Site::new();
    let (app, _) = site.app(false);

    let (status, headers, body) = send(app, form_post("/wp-html/v1/save", "a=1")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.is_empty());
    assert!(headers.get("x-hypermedia-error").is_some());
}

#[tokio::test]
async fn test_post_without_nonce_reveals_message() {
    let site = Site::new();
    let mut config = site.config(false);
    config.security.reveal_errors = true;
    let app = hyperfrag::server::router(AppState::from_config(config).unwrap());

    let (status, _, body) = send(app, form_post("/wp-html/v1/save", "a=1")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Nonce verification failed");
}

#[tokio::test]
async fn test_legacy_nonce_accepted_on_current_endpoint() {
    let site = Site::new();
    let (app, state) = site.app(false);
    let legacy = state.issue_nonce(CompatibilityMode::Legacy);

    let request = Request::post("/wp-html/v1/save")
        .header("X-WP-Nonce", legacy)
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, request).await;

    // no params, so the template reports an error payload
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        header_json(&headers, "hx-trigger"),
        Some(json!({
            "hmResponse": { "action": "save", "status": "error", "data": { "reason": "empty" } }
        }))
    );
}

#[tokio::test]
async fn test_payload_response_success() {
    let site = Site::new();
    let (app, state) = site.app(false);
    let token = state.issue_nonce(CompatibilityMode::Current);

    let (status, headers, body) = send(
        app,
        form_post("/wp-html/v1/save", &format!("_token={token}&a=hello")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(
        header_json(&headers, "hx-trigger"),
        Some(json!({
            "hmResponse": { "action": "save", "status": "success", "data": { "a": "hello" } }
        }))
    );
    assert!(headers
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("no-cache"));
}

#[tokio::test]
async fn test_template_die_is_200_with_error_header() {
    let site = Site::new();
    let (app, _) = site.app(false);

    let request = Request::get("/wp-html/v1/deny").body(Body::empty()).unwrap();
    let (status, headers, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(
        header_json(&headers, "x-hypermedia-error").unwrap()["data"]["message"],
        json!("Not allowed")
    );
}

#[tokio::test]
async fn test_legacy_endpoint() {
    let site = Site::new();
    let (app, _) = site.app(false);

    let request = Request::get("/hxwp/v1/old?x=42").body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "legacy 42");
}

#[tokio::test]
async fn test_legacy_endpoint_disabled() {
    let site = Site::new();
    let mut config = site.config(false);
    config.endpoints.legacy_enabled = false;
    let app = hyperfrag::server::router(AppState::from_config(config).unwrap());

    let request = Request::get("/hxwp/v1/old").body(Body::empty()).unwrap();
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.get("x-hypermedia-error").is_none());
}

#[tokio::test]
async fn test_traversal_identifier_is_404() {
    let site = Site::new();
    let (app, _) = site.app(true);

    let request = Request::get("/wp-html/v1/ns:..%2F..%2Fetc%2Fpasswd")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers.get("x-hypermedia-error").is_some());
}
