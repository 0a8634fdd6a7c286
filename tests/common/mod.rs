// Shared harness: a fresh database and media dir per test, the router driven
// in-process, and a mailer that keeps what it was asked to send.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use wey::auth::password::hash_password;
use wey::auth::{MailError, Mailer, TokenKind};
use wey::config::Config;
use wey::db;
use wey::routes;
use wey::state::AppState;

pub const PASSWORD: &str = "correct-horse-battery";
const BOUNDARY: &str = "wey-test-boundary";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// The six-digit code in the newest mail to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, _, body) = sent.iter().rev().find(|(rcpt, _, _)| rcpt == to)?;
        body.split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 6)
            .map(str::to_string)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub struct TestApp {
    _tmp: TempDir,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.auth.password_cost = 4;
        config.resolve_paths(tmp.path());

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(pool, config, mailer.clone());
        let router = routes::router(state.clone());

        Self {
            _tmp: tmp,
            state,
            mailer,
            router,
        }
    }

    /// Insert an active user directly and hand back (id, access token).
    pub fn create_user(&self, email: &str, name: &str) -> (String, String) {
        let id = uuid::Uuid::now_v7().to_string();
        let hash = hash_password(PASSWORD, 4).unwrap();
        self.conn()
            .execute(
                "INSERT INTO users (id, email, name, password_hash) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, name, hash],
            )
            .unwrap();
        let token = self.state.jwt.issue(&id, TokenKind::Access).unwrap();
        (id, token)
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.conn().query_row(sql, [], |r| r.get(0)).unwrap()
    }

    pub fn user_counter(&self, id: &str, column: &str) -> i64 {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", column),
                params![id],
                |r| r.get(0),
            )
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = Self::builder(Method::GET, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = Self::builder(Method::POST, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let request = Self::builder(Method::DELETE, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let request = Self::builder(method, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, token, body).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        token: Option<&str>,
        fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let encoded = fields
            .iter()
            .map(|(k, v)| format!("{}={}", form_escape(k), form_escape(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Self::builder(Method::POST, uri, token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(encoded))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        parts: &[Part<'_>],
    ) -> (StatusCode, Value) {
        let request = Self::builder(Method::POST, uri, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    /// Create a post through the API and return its id.
    pub async fn create_post(&self, token: &str, body: &str, is_private: bool) -> String {
        let flag = if is_private { "true" } else { "false" };
        let (status, post) = self
            .post_multipart(
                "/posts",
                Some(token),
                &[Part::Text("body", body), Part::Text("is_private", flag)],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create post failed: {}", post);
        post["id"].as_str().unwrap().to_string()
    }

    /// Send and accept a friendship request between two users.
    pub async fn befriend(&self, (a_id, a_token): (&str, &str), (b_id, b_token): (&str, &str)) {
        let (status, _) = self
            .post(&format!("/account/friendship-request/{}", b_id), Some(a_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = self
            .post(
                &format!("/account/friendship-request/{}/accepted", a_id),
                Some(b_token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

fn form_escape(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(bytes);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    out
}
