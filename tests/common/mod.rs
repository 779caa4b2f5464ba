//! Shared harness for the HTTP integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use gameforum::auth::{hash_password, TokenService};
use gameforum::config::Config;
use gameforum::db::{self, Database, NewGame, Role};
use gameforum::web::{create_app, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-with-enough-entropy";
pub const TEST_PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub tokens: TokenService,
    pub uploads_dir: PathBuf,
    _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        database_path: temp_dir.path().join("test.sqlite"),
        uploads_dir: temp_dir.path().join("uploads"),
        web_host: "127.0.0.1".to_string(),
        web_port: 0,
        cors_allow_origin: None,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_issuer: "gameforum".to_string(),
        jwt_ttl: Duration::from_secs(3600),
    }
}

pub async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

pub async fn setup_app() -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(&temp_dir);
    let db = Database::new(&config.database_path)
        .await
        .expect("Failed to create database");
    let uploads_dir = config.uploads_dir.clone();

    let state = AppState::new(config, db.clone()).expect("Failed to build state");
    let tokens = state.tokens.clone();

    TestApp {
        router: create_app(state),
        db,
        tokens,
        uploads_dir,
        _temp_dir: temp_dir,
    }
}

impl TestApp {
    /// Insert an account directly and return its id and a bearer token.
    pub async fn account(&self, username: &str, role: Role) -> (i64, String) {
        let hash = hash_password(TEST_PASSWORD).expect("hash");
        let email = format!("{username}@example.com");
        let id = db::create_user(self.db.pool(), username, &email, &hash, role)
            .await
            .expect("Failed to create user");
        let token = self.tokens.issue(id, username, role).expect("token");
        (id, token)
    }

    pub async fn game(&self, slug: &str) -> i64 {
        db::create_game(
            self.db.pool(),
            &NewGame {
                slug: slug.to_string(),
                title: format!("Game {slug}"),
                description: "A game used in tests".to_string(),
                cover_url: String::new(),
            },
        )
        .await
        .expect("Failed to create game")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, body) = self.send_with_headers(method, uri, token, body).await;
        (status, body)
    }

    pub async fn send_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, headers, parse_body(&bytes))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn send_multipart(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let boundary = "gameforum-test-boundary";
        let mut payload = Vec::new();
        payload.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        payload.extend_from_slice(data);
        payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(payload))
            .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, parse_body(&bytes))
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
