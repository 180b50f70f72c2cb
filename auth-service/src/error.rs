use axum::response::{IntoResponse, Response};
use common_auth::GuardError;
use common_http_errors::ApiError;
use thiserror::Error;

use crate::credentials::StoreError;

pub const MISSING_FIELDS: &str = "Bad Request, Reason: Missing";
pub const BAD_REQUEST: &str = "Bad Request";
pub const USER_NOTFOUND: &str = "User not found.";
pub const INCORRECT_PASSWORD: &str = "incorrect password.";
pub const EMAIL_ALREADY_EXISTS: &str = "Email already exist.";
pub const FORBIDDEN_ACCESS: &str = "Forbidden Access";

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("role check failed: {0:?}")]
    Guard(GuardError),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Store(StoreError),
    #[error("token issuance failed: {0}")]
    Token(anyhow::Error),
    #[error("password hashing failed: {0}")]
    Hashing(anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            // The store's constraint is the source of truth for uniqueness.
            StoreError::Conflict(_) => ServiceError::Conflict(EMAIL_ALREADY_EXISTS),
            other => ServiceError::Store(other),
        }
    }
}

impl From<GuardError> for ServiceError {
    fn from(value: GuardError) -> Self {
        ServiceError::Guard(value)
    }
}

/// Builds the `Bad Request, Reason: Missing a & b` message.
pub fn missing_fields_message(fields: &[&str]) -> String {
    format!("{MISSING_FIELDS} {}", fields.join(" & "))
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(message) => ApiError::validation("bad_request", message),
            ServiceError::Auth(message) => ApiError::unauthorized("invalid_credentials", message),
            ServiceError::Forbidden(message) => ApiError::forbidden("forbidden", message),
            ServiceError::Guard(err) => ApiError::from(err),
            ServiceError::NotFound(message) => ApiError::not_found("not_found", message),
            ServiceError::Conflict(message) => ApiError::conflict("conflict", message),
            ServiceError::Store(err) => ApiError::internal(err),
            ServiceError::Token(err) | ServiceError::Hashing(err) => ApiError::internal(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
