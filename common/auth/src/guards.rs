use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use tracing::warn;

use crate::roles::{is_admin, Principal, ROLE_ADMIN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    Forbidden { required: Vec<String> },
}

impl From<GuardError> for ApiError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::Forbidden { required } if required == [ROLE_ADMIN] => {
                ApiError::ForbiddenMissingRole { role: ROLE_ADMIN }
            }
            GuardError::Forbidden { required } => ApiError::forbidden(
                "forbidden",
                format!("Insufficient role. Required one of: {}", required.join(", ")),
            ),
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Admin-only gate built on [`is_admin`].
pub fn ensure_admin(principal: &Principal) -> Result<(), GuardError> {
    if is_admin(principal) {
        return Ok(());
    }
    warn!(user_id = %principal.user_id, role = %principal.role, "admin_check_failed");
    Err(GuardError::Forbidden {
        required: vec![ROLE_ADMIN.to_string()],
    })
}
