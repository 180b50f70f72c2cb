#![allow(dead_code)]

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use auth_service::credentials::run_migrations;
use auth_service::metrics::AuthMetrics;
use auth_service::{build_router, AppState, CredentialStore, InMemoryCredentialStore};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use common_auth::{InMemorySessionBlacklist, JwtConfig, SharedBlacklist};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub blacklist: SharedBlacklist,
    pub metrics: Arc<AuthMetrics>,
}

impl TestApp {
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryCredentialStore::new()))
    }

    pub fn with_store(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_parts(store, Arc::new(InMemorySessionBlacklist::new()))
    }

    pub fn with_parts(store: Arc<dyn CredentialStore>, blacklist: SharedBlacklist) -> Self {
        Self::build(store, blacklist, JwtConfig::new(TEST_SECRET))
    }

    /// In-memory backends with a custom JWT config; keep `TEST_SECRET`
    /// when tokens are signed by hand.
    pub fn with_jwt(jwt: JwtConfig) -> Self {
        Self::build(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemorySessionBlacklist::new()),
            jwt,
        )
    }

    fn build(store: Arc<dyn CredentialStore>, blacklist: SharedBlacklist, jwt: JwtConfig) -> Self {
        let metrics = Arc::new(AuthMetrics::new().expect("metrics registry"));
        let state = AppState::new(store, blacklist.clone(), jwt, metrics.clone());
        Self {
            router: build_router(state),
            blacklist,
            metrics,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok((status, body))
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(json_request("POST", uri, None, body)?).await
    }

    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<StatusCode> {
        let (status, _) = self
            .post_json(
                "/signup",
                serde_json::json!({
                    "name": name,
                    "email": email,
                    "password": password,
                    "role": role,
                }),
            )
            .await?;
        Ok(status)
    }

    /// Logs in and returns the issued token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self
            .post_json(
                "/login",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("login response missing token: {body}"))
    }
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    Ok(builder.body(Body::empty())?)
}

/// Postgres pool for tests that opt in through `AUTH_TEST_DATABASE_URL`.
pub async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(database_url) = env::var("AUTH_TEST_DATABASE_URL") else {
        eprintln!("Skipping Postgres-backed tests: set AUTH_TEST_DATABASE_URL to run them.");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    if env_flag_enabled("AUTH_TEST_APPLY_MIGRATIONS") {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
        run_migrations(&pool, &dir).await?;
    }

    Ok(Some(pool))
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
