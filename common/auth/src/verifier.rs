use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Verifies HS256 session tokens against the process-wide secret.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret());
        Self { config, key }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds.into();
        validation
    }

    /// Checks signature, algorithm and expiry, then maps the payload to [`Claims`].
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::InvalidHeader(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let token_data = decode::<Value>(token, &self.key, &self.validation())?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(
            user_id = %claims.user_id,
            token_id = ?claims.token_id,
            expires_at = %claims.expires_at,
            "verified session token"
        );
        Ok(claims)
    }

    /// Reads the `exp` claim without checking the signature or expiry.
    ///
    /// Only suitable for sizing revocation records; never for authorization.
    pub fn peek_expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = self.validation();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        let data = decode::<Value>(token, &self.key, &validation).ok()?;
        let exp = data.claims.get("exp")?.as_i64()?;
        Utc.timestamp_opt(exp, 0).single()
    }
}
