// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared helpers for router-level tests: a mocked JWKS endpoint, temp
//! storage, token signing and multipart bodies.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use relational_media_server::{
    api::router,
    auth::{AuthState, VerificationConfig},
    state::AppState,
    storage::LocalStorage,
};

pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
pub const ROGUE_KEY: &[u8] = include_bytes!("../fixtures/rogue_key.pem");
pub const KID: &str = "media-key-1";
pub const ISSUER: &str = "http://user-service:3000";
pub const AUDIENCE: &str = "backboard";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const MAX_FILE_SIZE: u64 = 1024;

pub struct TestApp {
    pub router: Router,
    pub jwks_server: MockServer,
    pub storage_dir: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Number of entries in a storage directory.
    pub fn stored_entries(&self, directory: &str) -> usize {
        std::fs::read_dir(self.storage_dir.path().join(directory))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// App whose JWKS endpoint serves the test key set.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(jwks_ok(), None).await
}

/// App whose JWKS endpoint answers with `response`, optionally asserting
/// how many times it is fetched (checked when the app is dropped).
pub async fn spawn_app_with(response: ResponseTemplate, expected_fetches: Option<u64>) -> TestApp {
    let jwks_server = MockServer::start().await;
    let mock = Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(response);
    match expected_fetches {
        Some(n) => mock.expect(n).mount(&jwks_server).await,
        None => mock.mount(&jwks_server).await,
    }

    let storage_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(storage_dir.path(), "http://media.test")
        .await
        .unwrap();

    let auth = AuthState::new(VerificationConfig::new(
        format!("{}{JWKS_PATH}", jwks_server.uri()),
        ISSUER,
        AUDIENCE,
    ));
    let state = AppState::new(auth, Arc::new(storage)).with_max_file_size(MAX_FILE_SIZE);

    TestApp {
        router: router(state),
        jwks_server,
        storage_dir,
    }
}

pub fn jwks_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(JWKS, "application/json")
}

pub fn claims(permissions: &[&str]) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "user_123",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 3600,
        "email": "ada@example.com",
        "permissions": permissions,
    })
}

pub fn sign_with(key: &[u8], claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(key).unwrap()).unwrap()
}

/// Valid token holding `permissions`.
pub fn token(permissions: &[&str]) -> String {
    sign_with(SIGNING_KEY, &claims(permissions))
}

/// Multipart body with a single file part. Returns (content type, body).
pub fn file_form(
    field: &str,
    file_name: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> (String, Vec<u8>) {
    let boundary = "media-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub fn upload_request(bearer: Option<&str>, form: (String, Vec<u8>)) -> Request<Body> {
    let (content_type, body) = form;
    let mut builder = Request::builder()
        .method("POST")
        .uri("/files")
        .header(header::CONTENT_TYPE, content_type);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn png_upload(bearer: Option<&str>) -> Request<Body> {
    upload_request(
        bearer,
        file_form("file", "avatar.png", Some("image/png"), b"\x89PNG test image"),
    )
}

pub fn request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
