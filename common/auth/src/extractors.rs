use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use tracing::warn;

use crate::blacklist::SessionBlacklist;
use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::roles::Principal;
use crate::verifier::JwtVerifier;

pub type SharedBlacklist = Arc<dyn SessionBlacklist>;

/// Authenticated identity for a request, produced by the access guard.
///
/// Rejections, in order: missing header (401), malformed header (401),
/// revoked token (401), failed verification (403). The blacklist is consulted
/// before the signature is checked.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub claims: Claims,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    SharedBlacklist: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let blacklist = SharedBlacklist::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let value = header_value
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorization)?;
        let token = parse_bearer(value)?.to_owned();

        match blacklist.is_revoked(&token).await {
            Ok(true) => return Err(AuthError::Blacklisted),
            Ok(false) => {}
            Err(err) => warn!(error = ?err, "blacklist lookup failed; continuing with verification"),
        }

        let claims = verifier.verify(&token)?;
        let principal = claims.principal();

        Ok(Self {
            principal,
            claims,
            token,
        })
    }
}

/// Extracts the token from a `Bearer <token>` header value. The scheme is
/// matched case-insensitively and exactly one token must follow it.
pub fn parse_bearer(value: &str) -> AuthResult<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::InvalidAuthorization),
    }
}
