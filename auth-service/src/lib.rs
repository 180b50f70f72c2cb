pub mod app;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod password;
pub mod service;
pub mod tokens;
pub mod user_handlers;

pub use app::{build_router, AppState};
pub use config::{load_auth_config, AuthConfig};
pub use credentials::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
pub use error::{ServiceError, ServiceResult};
pub use service::AuthService;
