use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

pub const NOT_AUTHENTICATED: &str = "You Are Not Authenticated";
pub const TOKEN_BLACKLISTED: &str = "token is black listed";
pub const TOKEN_INVALID: &str = "Token is not valid";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("token has been revoked")]
    Blacklisted,
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::MissingAuthorization => {
                ApiError::unauthorized("not_authenticated", NOT_AUTHENTICATED)
            }
            AuthError::InvalidAuthorization => {
                ApiError::unauthorized("auth_header", "Authorization header malformed")
            }
            AuthError::Blacklisted => ApiError::unauthorized("token_blacklisted", TOKEN_BLACKLISTED),
            // Every verification failure is reported the same way.
            AuthError::InvalidHeader(_)
            | AuthError::Verification(_)
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_) => ApiError::forbidden("token_invalid", TOKEN_INVALID),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
