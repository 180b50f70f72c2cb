use anyhow::{anyhow, Context, Result};
use common_auth::{JwtConfig, DEFAULT_TOKEN_TTL_SECONDS};
use std::env;
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_BLACKLIST_PREFIX: &str = "blacklist";
const DEFAULT_PORT: u16 = 8085;
const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
];

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub database_url: Option<String>,
    pub apply_migrations: bool,
    pub redis_url: Option<String>,
    pub blacklist_prefix: String,
    pub host: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl AuthConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_auth_config() -> Result<AuthConfig> {
    load_with(|key| env::var(key).ok())
}

fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthConfig> {
    let secret = lookup("AUTH_JWT_SECRET")
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("AUTH_JWT_SECRET must be set"))?;

    let token_ttl = lookup("AUTH_TOKEN_TTL_SECS")
        .map(|value| value.trim().parse::<i64>())
        .transpose()
        .context("Failed to parse AUTH_TOKEN_TTL_SECS")?
        .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);
    if token_ttl <= 0 {
        return Err(anyhow!("AUTH_TOKEN_TTL_SECS must be positive"));
    }

    let leeway = lookup("AUTH_JWT_LEEWAY_SECS")
        .map(|value| value.trim().parse::<u32>())
        .transpose()
        .context("Failed to parse AUTH_JWT_LEEWAY_SECS")?
        .unwrap_or(0);

    let jwt = JwtConfig::new(secret)
        .with_token_ttl(token_ttl)
        .with_leeway(leeway);

    let database_url = lookup("DATABASE_URL").and_then(|value| normalize_optional(&value));
    let apply_migrations = lookup("AUTH_APPLY_MIGRATIONS")
        .map(|value| parse_bool(&value))
        .unwrap_or(false);
    let redis_url = lookup("REDIS_URL").and_then(|value| normalize_optional(&value));
    let blacklist_prefix = lookup("AUTH_BLACKLIST_PREFIX")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_BLACKLIST_PREFIX.to_string());

    let host = lookup("HOST")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let host: IpAddr = host
        .parse()
        .with_context(|| format!("Invalid HOST '{host}'"))?;
    let port = lookup("PORT")
        .map(|value| value.trim().parse::<u16>())
        .transpose()
        .context("Failed to parse PORT")?
        .unwrap_or(DEFAULT_PORT);

    let cors_origins = lookup("AUTH_CORS_ORIGINS")
        .map(|value| parse_list(&value))
        .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());

    Ok(AuthConfig {
        jwt,
        database_url,
        apply_migrations,
        redis_url,
        blacklist_prefix,
        host,
        port,
        cors_origins,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
