pub mod blacklist;
pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod roles;
pub mod verifier;

pub use blacklist::{
    InMemorySessionBlacklist, RedisSessionBlacklist, SessionBlacklist, REVOKED_MARKER,
};
pub use claims::Claims;
pub use config::{JwtConfig, DEFAULT_TOKEN_TTL_SECONDS};
pub use error::{AuthError, AuthResult};
pub use extractors::{parse_bearer, AuthContext, SharedBlacklist};
pub use guards::{ensure_admin, GuardError};
pub use roles::{is_admin, Principal, Role, ROLE_ADMIN, ROLE_EDITOR, ROLE_VIEWER};
pub use verifier::JwtVerifier;
