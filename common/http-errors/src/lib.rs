use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

pub const INTERNAL_ERROR: &str = "Internal server error";

/// JSON envelope shared by success and error responses.
#[derive(Serialize, Debug)]
pub struct Envelope<T> {
    pub status: u16,
    pub data: Option<T>,
    pub message: String,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(status: StatusCode, data: Option<T>, message: impl Into<String>) -> Self {
        Self { status: status.as_u16(), data, message: message.into(), error: None, missing_role: None }
    }
}

/// Success response wrapped in the envelope.
pub fn respond<T: Serialize>(status: StatusCode, data: Option<T>, message: impl Into<String>) -> Response {
    (status, Json(Envelope::ok(status, data, message))).into_response()
}

#[derive(Debug)]
pub enum ApiError {
    Validation { code: &'static str, message: String },
    Unauthorized { code: &'static str, message: String },
    ForbiddenMissingRole { role: &'static str },
    Forbidden { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self { Self::Validation { code, message: message.into() } }
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self { Self::Unauthorized { code, message: message.into() } }
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self { Self::Forbidden { code, message: message.into() } }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self { Self::NotFound { code, message: message.into() } }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self { Self::Conflict { code, message: message.into() } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenMissingRole { .. } | ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::Forbidden { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. } => code,
            ApiError::ForbiddenMissingRole { .. } => "missing_role",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let (message, missing_role) = match self {
            ApiError::Validation { message, .. }
            | ApiError::Unauthorized { message, .. }
            | ApiError::Forbidden { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Conflict { message, .. } => (message, None),
            ApiError::ForbiddenMissingRole { role } => ("Forbidden Access".to_string(), Some(role.to_string())),
            ApiError::Internal { message } => {
                // Details stay in the logs; clients get the generic message.
                if let Some(detail) = message {
                    tracing::error!(error = %detail, "internal error");
                }
                (INTERNAL_ERROR.to_string(), None)
            }
        };
        let body: Envelope<()> = Envelope {
            status: status.as_u16(),
            data: None,
            message,
            error: Some(error_code.to_string()),
            missing_role,
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

