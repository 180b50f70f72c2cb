use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use auth_service::credentials::run_migrations;
use auth_service::metrics::AuthMetrics;
use auth_service::{
    build_router, load_auth_config, AppState, AuthConfig, CredentialStore,
    InMemoryCredentialStore, PgCredentialStore,
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use common_auth::{InMemorySessionBlacklist, RedisSessionBlacklist, SharedBlacklist};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = load_auth_config()?;
    let store = build_store(&config).await?;
    let blacklist = build_blacklist(&config).await?;
    let metrics = Arc::new(AuthMetrics::new()?);

    let state = AppState::new(store, blacklist, config.jwt.clone(), metrics);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = build_router(state).layer(cors);

    let addr = config.listen_addr();
    info!(%addr, "starting auth-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &AuthConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set; accounts are kept in memory");
        return Ok(Arc::new(InMemoryCredentialStore::new()));
    };

    let pool = PgPool::connect(database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;
    if config.apply_migrations {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        run_migrations(&pool, &dir).await?;
    }
    Ok(Arc::new(PgCredentialStore::new(pool)))
}

async fn build_blacklist(config: &AuthConfig) -> anyhow::Result<SharedBlacklist> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let blacklist = RedisSessionBlacklist::new(url, config.blacklist_prefix.clone())
                .await
                .context("Failed to connect to REDIS_URL")?;
            Ok(Arc::new(blacklist))
        }
        None => {
            warn!("REDIS_URL not set; revoked sessions are kept in memory");
            Ok(Arc::new(InMemorySessionBlacklist::new()))
        }
    }
}
