//! Shared setup for the integration suites: a temporary SQLite database and
//! object store behind the embedded backend.

#![allow(dead_code)]

pub mod stale;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

use inkpost::backend::local::{LocalConnector, LocalSettings};
use inkpost::backend::objects::ObjectStore;
use inkpost::backend::{decode, Backend, Connector, Row, Table};
use inkpost::config::Config;
use inkpost::db::models::{Post, User};
use inkpost::db::{self, DbPool};
use inkpost::profile;
use inkpost::state::AppState;

pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
    pub connector: Arc<LocalConnector>,
}

/// A confirmed, signed-in account with its user row.
pub struct TestUser {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub backend: Arc<dyn Backend>,
}

impl TestUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn cookie_header(&self) -> String {
        format!(
            "session_token={}; refresh_token={}",
            self.access_token, self.refresh_token
        )
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("objects"));
        config.auth.bcrypt_cost = 4;

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let objects = ObjectStore::new(
            config.objects_path(),
            Url::parse("http://localhost:3000/storage/").unwrap(),
        );
        let connector = Arc::new(LocalConnector::new(
            pool,
            objects,
            LocalSettings::from(&config.auth),
        ));

        Self {
            dir,
            config,
            connector,
        }
    }

    pub fn pool(&self) -> &DbPool {
        self.connector.pool()
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            connector: self.connector.clone(),
        }
    }

    pub fn app(&self) -> Router {
        inkpost::app(self.state())
    }

    pub fn service(&self) -> Arc<dyn Backend> {
        self.connector.service()
    }

    /// Signs up, confirms and creates the user row.
    pub async fn user(&self, email: &str) -> TestUser {
        let anon = self.connector.anonymous();
        let pending = anon.sign_up(email, "hunter22").await.unwrap();
        let session = anon
            .confirm_sign_up(&pending.confirmation_token)
            .await
            .unwrap();
        let backend = self.connector.for_token(&session.access_token);
        let user = profile::ensure_profile(backend.as_ref(), &session.identity)
            .await
            .unwrap();
        TestUser {
            user,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            backend,
        }
    }

    /// Pushes every session's access token into the past.
    pub fn expire_access_tokens(&self) {
        let conn = self.pool().get().unwrap();
        let past = (Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
        conn.execute(
            "UPDATE auth_sessions SET access_expires_at = ?1",
            params![past],
        )
        .unwrap();
    }

    /// Inserts an identity and user row directly, bypassing sign-up.
    pub fn insert_raw_user(&self, id: &str, username: &str) {
        let conn = self.pool().get().unwrap();
        conn.execute(
            "INSERT INTO auth_identities (id, email, password_hash) VALUES (?1, ?2, 'x')",
            params![id, format!("{id}@example.com")],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![id, username, Utc::now().to_rfc3339()],
        )
        .unwrap();
    }
}

pub async fn insert_post(
    backend: &dyn Backend,
    user_id: &str,
    title: &str,
    created_at: DateTime<Utc>,
) -> Post {
    let mut row = Row::new();
    row.insert("user_id".into(), json!(user_id));
    row.insert("title".into(), json!(title));
    row.insert("content".into(), json!("Some *markdown* body"));
    row.insert("category".into(), json!("notes"));
    row.insert("created_at".into(), json!(created_at.to_rfc3339()));
    decode(backend.insert(Table::Posts, row).await.unwrap()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub fn form_request(method: &str, uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub const BOUNDARY: &str = "inkpost-test-boundary";

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub fn multipart_request(uri: &str, cookie: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}
