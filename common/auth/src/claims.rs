use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::{Principal, Role};

/// Application-focused representation of verified session token claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub token_id: Option<Uuid>,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    user_id: String,
    #[serde(default)]
    role: String,
    exp: i64,
    #[serde(default)]
    jti: Option<String>,
}

fn timestamp(name: &'static str, value: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(value, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidClaim(name, value.to_string()))
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let user_id = Uuid::parse_str(&value.user_id)
            .map_err(|_| AuthError::InvalidClaim("user_id", value.user_id.clone()))?;

        let expires_at = timestamp("exp", value.exp)?;

        let token_id = match value.jti {
            Some(jti) => Some(
                Uuid::parse_str(&jti).map_err(|_| AuthError::InvalidClaim("jti", jti.clone()))?,
            ),
            None => None,
        };

        Ok(Self {
            user_id,
            role: Role::parse(&value.role),
            expires_at,
            token_id,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value)
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        Claims::try_from(repr)
    }
}
