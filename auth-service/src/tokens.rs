use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use common_auth::{JwtConfig, Role};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

/// Issues HS256 session tokens with the process-wide secret.
pub struct TokenSigner {
    config: JwtConfig,
    encoding_key: EncodingKey,
}

pub struct TokenSubject {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

#[derive(Serialize)]
struct SessionClaims<'a> {
    user_id: String,
    role: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
}

impl TokenSigner {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret());
        Self {
            config,
            encoding_key,
        }
    }

    pub fn token_ttl_seconds(&self) -> i64 {
        self.config.token_ttl_seconds
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<IssuedToken> {
        self.issue_at(subject, Utc::now())
    }

    pub fn issue_at(&self, subject: &TokenSubject, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now + Duration::seconds(self.config.token_ttl_seconds);
        let token_id = Uuid::new_v4();

        let claims = SessionClaims {
            user_id: subject.user_id.to_string(),
            role: subject.role.as_str(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: token_id.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| anyhow!("Failed to sign session token: {err}"))?;

        Ok(IssuedToken {
            token,
            token_id,
            expires_at,
            expires_in: self.config.token_ttl_seconds,
        })
    }
}
