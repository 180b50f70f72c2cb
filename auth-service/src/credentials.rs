use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::Role;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique field '{0}'")]
    Conflict(&'static str),
    #[error("credential store failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &value {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::Conflict("email");
            }
        }
        StoreError::Backend(value.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted account record.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account fields safe to hand back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicIdentity {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
}

impl From<&Identity> for PublicIdentity {
    fn from(value: &Identity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            email: value.email.clone(),
            role: value.role.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub offset: i64,
    pub limit: Option<i64>,
}

/// Persistence boundary for accounts. Implementations must enforce email
/// uniqueness themselves and report a violation as [`StoreError::Conflict`].
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>>;
    async fn insert(&self, identity: NewIdentity) -> StoreResult<Identity>;
    /// Returns `false` when no account has the id.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<Identity>>;
}

// ---------------- Postgres Implementation ----------------

const IDENTITY_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let row = sqlx::query_as::<_, Identity>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(identity.name)
        .bind(identity.email)
        .bind(identity.password_hash)
        .bind(identity.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<Identity>> {
        let rows = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM users
             WHERE ($1::TEXT IS NULL OR role = $1)
             ORDER BY created_at, id
             OFFSET $2 LIMIT $3"
        ))
        .bind(filter.role.as_ref().map(|role| role.as_str().to_string()))
        .bind(filter.offset)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Applies every `*.sql` file in `dir` in name order, one statement at a time.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> anyhow::Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read migrations from {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.retain(|path| path.extension().is_some_and(|ext| ext == "sql"));
    entries.sort();

    for path in entries {
        let sql = std::fs::read_to_string(&path)?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed)
                .execute(pool)
                .await
                .with_context(|| format!("Migration {} failed", path.display()))?;
        }
        info!(migration = %path.display(), "applied migration");
    }

    Ok(())
}

// ---------------- In-Memory Implementation ----------------

/// Process-local store. The email check and the insert happen under one write
/// lock, so concurrent registrations of one address cannot both succeed.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<RwLock<HashMap<Uuid, Identity>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let guard = self.inner.read().await;
        Ok(guard.values().find(|identity| identity.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Identity>> {
        let guard = self.inner.read().await;
        Ok(guard.get(&id).cloned())
    }

    async fn insert(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let mut guard = self.inner.write().await;
        if guard.values().any(|existing| existing.email == identity.email) {
            return Err(StoreError::Conflict("email"));
        }

        let now = Utc::now();
        let record = Identity {
            id: Uuid::new_v4(),
            name: identity.name,
            email: identity.email,
            password_hash: identity.password_hash,
            role: identity.role,
            created_at: now,
            updated_at: now,
        };
        guard.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&id) {
            Some(identity) => {
                identity.password_hash = password_hash.to_string();
                identity.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(&id).is_some())
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<Identity>> {
        let guard = self.inner.read().await;
        let mut rows = guard
            .values()
            .filter(|identity| filter.role.as_ref().map_or(true, |role| &identity.role == role))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(usize::MAX);
        let limit = filter
            .limit
            .map(|limit| usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}
