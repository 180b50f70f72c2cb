use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";
pub const ROLE_VIEWER: &str = "viewer";

/// Role carried by an authenticated principal.
///
/// Matching is exact: `"Admin"` or `""` end up in `Unknown` and never grant
/// privileges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    Unknown(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value {
            ROLE_ADMIN => Role::Admin,
            ROLE_EDITOR => Role::Editor,
            ROLE_VIEWER => Role::Viewer,
            other => Role::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Editor => ROLE_EDITOR,
            Role::Viewer => ROLE_VIEWER,
            Role::Unknown(value) => value,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown(_))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: impl Into<Role>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }
}

/// Whether the principal may perform admin-only actions.
pub fn is_admin(principal: &Principal) -> bool {
    principal.role == Role::Admin
}
