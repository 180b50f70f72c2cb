use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

// Redis dependencies (only used by Redis implementation)
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Marker stored against every revoked token.
pub const REVOKED_MARKER: &str = "blacklisted";

/// Key-value store of revoked session tokens, keyed by the raw token string.
#[async_trait]
pub trait SessionBlacklist: Send + Sync {
    /// Records the token as revoked for at least `ttl`.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()>;
    async fn is_revoked(&self, token: &str) -> Result<bool>;
}

// ---------------- Redis Implementation ----------------

#[derive(Clone)]
pub struct RedisSessionBlacklist {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisSessionBlacklist {
    pub async fn new(redis_url: &str, prefix: String) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self { manager, prefix })
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, token)
    }
}

#[async_trait]
impl SessionBlacklist for RedisSessionBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(self.key(token))
            .arg(REVOKED_MARKER)
            .arg("EX")
            .arg(seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let marker: Option<String> = conn.get(self.key(token)).await?;
        Ok(marker.as_deref() == Some(REVOKED_MARKER))
    }
}

// ---------------- In-Memory Implementation ----------------

/// Process-local blacklist; entries are pruned once their TTL has elapsed.
#[derive(Clone, Default)]
pub struct InMemorySessionBlacklist {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
}

impl InMemorySessionBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        guard.retain(|_, expires_at| *expires_at > now);
        guard.len()
    }
}

#[async_trait]
impl SessionBlacklist for InMemorySessionBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        guard.retain(|_, expires_at| *expires_at > now);
        let expires_at = now + ttl;
        // Never shorten an existing record.
        let entry = guard.entry(token.to_string()).or_insert(expires_at);
        if *entry < expires_at {
            *entry = expires_at;
        }
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        match guard.get(token) {
            Some(expires_at) if *expires_at > Instant::now() => Ok(true),
            Some(_) => {
                guard.remove(token);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
