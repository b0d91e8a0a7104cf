//! Common test utilities for hook-relay integration tests
//!
//! Every test gets its own upstream mock server and archive directory, and
//! the pipeline is wired exactly as the service binary wires it.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use hook_relay_api::{build_pipeline, create_router, AppState, ServiceConfig};
use hook_relay_core::{credential, signature, SharedSecret};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SECRET: &str = "integration-shared-secret";
pub const TOKEN: &str = "ghp_integrationToken0123456789";
pub const IV: [u8; 16] = [
    0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];

pub struct TestEnv {
    pub upstream: MockServer,
    pub config: ServiceConfig,
    _dir: TempDir,
}

impl TestEnv {
    /// Defaults with the upstream and archive redirected into the test sandbox
    pub async fn new() -> Self {
        let upstream = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let mut config = ServiceConfig::default();
        config.upstream.api_base_url = upstream.uri();
        config.upstream.timeout_seconds = 2;
        config.webhook.archive_path = dir.path().join("samples").join("payload.json");

        Self {
            upstream,
            config,
            _dir: dir,
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.config.webhook.archive_path.clone()
    }

    /// Router wired with the production pipeline and the given secret
    pub fn router_with_secret(&self, secret: Option<&str>) -> Router {
        let secret = secret.map(SharedSecret::from);
        let pipeline = build_pipeline(&self.config, secret).unwrap();
        create_router(AppState::new(self.config.clone(), pipeline))
    }

    pub fn router(&self) -> Router {
        self.router_with_secret(Some(SECRET))
    }

    /// Serve `count` commits for `repo`#`pr`, expecting the integration token
    pub async fn mount_commits(&self, repo: &str, pr: u64, count: usize) {
        let commits: Vec<Value> = (0..count)
            .map(|i| json!({ "sha": format!("{:040x}", i), "commit": { "message": format!("commit {i}") } }))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/repos/{}/pulls/{}/commits", repo, pr)))
            .and(header("Authorization", TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(commits)))
            .expect(1)
            .mount(&self.upstream)
            .await;
    }

    pub fn archived_payload(&self) -> Option<Value> {
        std::fs::read(self.archive_path())
            .ok()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }
}

/// Headers a well-behaved producer sends for `body`
pub fn producer_headers(body: &[u8]) -> Vec<(&'static str, String)> {
    let secret = SharedSecret::from(SECRET);
    let sealed = credential::encrypt(&secret, TOKEN, &IV).unwrap();

    vec![
        ("content-type", "application/json".to_string()),
        ("X-Hub-Signature-256", signature::sign(&secret, body)),
        ("X-Encrypted-Token", sealed.ciphertext_b64),
        ("X-Token-IV", sealed.iv_hex),
    ]
}

/// Build a POST with the given headers, skipping any named in `omit`
pub fn delivery(
    uri: &str,
    body: Vec<u8>,
    headers: Vec<(&'static str, String)>,
    omit: &[&str],
) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    for (name, value) in headers {
        if !omit.iter().any(|o| o.eq_ignore_ascii_case(name)) {
            builder = builder.header(name, value);
        }
    }
    builder.body(Body::from(body)).unwrap()
}

/// A correctly signed and sealed delivery of `payload`
pub fn signed_delivery(uri: &str, payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let headers = producer_headers(&body);
    delivery(uri, body, headers, &[])
}

pub fn pr_event(action: &str, repo: &str, number: u64) -> Value {
    json!({
        "action": action,
        "number": number,
        "repository": { "full_name": repo, "private": false },
        "pull_request": { "number": number, "state": "open", "title": "Add relay" },
        "sender": { "login": "octocat" }
    })
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
