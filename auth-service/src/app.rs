use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{delete, get, post, put};
use axum::Router;
use common_auth::{JwtConfig, JwtVerifier, SharedBlacklist};

use crate::credentials::CredentialStore;
use crate::metrics::AuthMetrics;
use crate::service::AuthService;
use crate::tokens::TokenSigner;
use crate::user_handlers::{
    add_user, delete_user, health, list_users, login, logout, metrics, signup, update_password,
};

#[derive(Clone)]
pub struct AppState {
    pub service: AuthService,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub blacklist: SharedBlacklist,
    pub metrics: Arc<AuthMetrics>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl FromRef<AppState> for SharedBlacklist {
    fn from_ref(state: &AppState) -> Self {
        state.blacklist.clone()
    }
}

impl AppState {
    /// Wires the signer and verifier from one `JwtConfig` so both sides share
    /// the secret.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        blacklist: SharedBlacklist,
        jwt: JwtConfig,
        metrics: Arc<AuthMetrics>,
    ) -> Self {
        let jwt_verifier = Arc::new(JwtVerifier::new(jwt.clone()));
        let token_signer = Arc::new(TokenSigner::new(jwt));
        let service = AuthService::new(
            store,
            blacklist.clone(),
            token_signer,
            jwt_verifier.clone(),
            metrics.clone(),
        );
        Self {
            service,
            jwt_verifier,
            blacklist,
            metrics,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/users", get(list_users))
        .route("/users/add-user", post(add_user))
        .route("/users/update-password", put(update_password))
        .route("/users/:user_id", delete(delete_user))
        .with_state(state)
}
