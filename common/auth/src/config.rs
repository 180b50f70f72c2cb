use std::fmt;
use std::sync::Arc;

/// Default lifetime of an issued session token.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;

/// Runtime configuration shared by the token signer and the verifier.
///
/// The signing secret is process-wide and read-only once built; clones share
/// the same allocation.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Arc<[u8]>,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with a one hour token lifetime and no leeway.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            leeway_seconds: 0,
        }
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Adjust the token lifetime.
    pub fn with_token_ttl(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
