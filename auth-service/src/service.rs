use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common_auth::{ensure_admin, parse_bearer, JwtVerifier, Principal, Role, SharedBlacklist};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::credentials::{CredentialStore, NewIdentity, PublicIdentity, UserFilter};
use crate::error::{
    missing_fields_message, ServiceError, ServiceResult, BAD_REQUEST, EMAIL_ALREADY_EXISTS,
    FORBIDDEN_ACCESS, INCORRECT_PASSWORD, USER_NOTFOUND,
};
use crate::metrics::AuthMetrics;
use crate::password::{hash_password, verify_password};
use crate::tokens::{TokenSigner, TokenSubject};

/// Roles an admin may hand out through `add_user`.
const ASSIGNABLE_ROLES: &[Role] = &[Role::Editor, Role::Viewer];

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_in: i64,
    pub user: PublicIdentity,
}

/// Registration, login, logout and account administration over the
/// credential store and the session blacklist.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    blacklist: SharedBlacklist,
    signer: Arc<TokenSigner>,
    verifier: Arc<JwtVerifier>,
    metrics: Arc<AuthMetrics>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        blacklist: SharedBlacklist,
        signer: Arc<TokenSigner>,
        verifier: Arc<JwtVerifier>,
        metrics: Arc<AuthMetrics>,
    ) -> Self {
        Self {
            store,
            blacklist,
            signer,
            verifier,
            metrics,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<PublicIdentity> {
        let [email, password, name] = match require([
            ("email", trimmed(request.email)),
            ("password", non_blank(request.password)),
            ("name", trimmed(request.name)),
        ]) {
            Ok(fields) => fields,
            Err(err) => {
                self.metrics.registration("invalid");
                return Err(err);
            }
        };

        let role = match trimmed(request.role) {
            None => Role::Viewer,
            Some(raw) => {
                let role = Role::parse(&raw);
                if !role.is_known() {
                    self.metrics.registration("invalid");
                    return Err(ServiceError::Validation(format!(
                        "{BAD_REQUEST}, Reason: Unknown role {raw}"
                    )));
                }
                role
            }
        };

        let created = self
            .create_identity(Some(name), email, &password, role)
            .await?;
        info!(user_id = %created.id, role = %created.role, "user registered");
        Ok(created)
    }

    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginOutcome> {
        let [email, password] = match require([
            ("email", trimmed(request.email)),
            ("password", non_blank(request.password)),
        ]) {
            Ok(fields) => fields,
            Err(err) => {
                self.metrics.login_attempt("invalid");
                return Err(err);
            }
        };

        let Some(identity) = self.store.find_by_email(&email).await? else {
            self.metrics.login_attempt("unknown_user");
            return Err(ServiceError::NotFound(USER_NOTFOUND));
        };

        if !verify_password(&password, &identity.password_hash) {
            self.metrics.login_attempt("bad_password");
            warn!(user_id = %identity.id, "login rejected: incorrect password");
            return Err(ServiceError::Auth(INCORRECT_PASSWORD));
        }

        let issued = self
            .signer
            .issue(&TokenSubject {
                user_id: identity.id,
                role: identity.role.clone(),
            })
            .map_err(ServiceError::Token)?;

        self.metrics.login_attempt("success");
        info!(
            user_id = %identity.id,
            token_id = %issued.token_id,
            expires_at = %issued.expires_at,
            "login succeeded"
        );
        Ok(LoginOutcome {
            token: issued.token,
            expires_in: issued.expires_in,
            user: PublicIdentity::from(&identity),
        })
    }

    /// Revokes the token carried in an `Authorization` header value. Storage
    /// failures are logged and counted but never reported to the caller.
    pub async fn logout(&self, authorization: Option<&str>) -> ServiceResult<()> {
        let token = authorization
            .and_then(|header| parse_bearer(header).ok())
            .ok_or_else(|| ServiceError::Validation(BAD_REQUEST.to_string()))?;

        let ttl = self.revocation_ttl(token, Utc::now());
        match self.blacklist.revoke(token, ttl).await {
            Ok(()) => {
                self.metrics.revocation("stored");
                info!(ttl_secs = ttl.as_secs(), "session revoked");
            }
            Err(err) => {
                self.metrics.revocation("failed");
                warn!(error = ?err, "failed to record session revocation");
            }
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        principal: &Principal,
        request: UpdatePasswordRequest,
    ) -> ServiceResult<()> {
        let [new_password, old_password] = require([
            ("new password", non_blank(request.new_password)),
            ("old password", non_blank(request.old_password)),
        ])?;

        let identity = self
            .store
            .find_by_id(principal.user_id)
            .await?
            .ok_or(ServiceError::NotFound(USER_NOTFOUND))?;

        if !verify_password(&old_password, &identity.password_hash) {
            warn!(user_id = %identity.id, "password change rejected: incorrect password");
            return Err(ServiceError::Auth(INCORRECT_PASSWORD));
        }

        let password_hash = hash_password(&new_password).map_err(ServiceError::Hashing)?;
        if !self.store.update_password(identity.id, &password_hash).await? {
            return Err(ServiceError::NotFound(USER_NOTFOUND));
        }
        info!(user_id = %identity.id, "password updated");
        Ok(())
    }

    pub async fn list_users(
        &self,
        principal: &Principal,
        query: ListUsersQuery,
    ) -> ServiceResult<Vec<PublicIdentity>> {
        ensure_admin(principal)?;

        let filter = UserFilter {
            role: trimmed(query.role).map(|role| Role::parse(&role)),
            offset: query.offset.unwrap_or(0).max(0),
            // A zero or negative limit means no limit.
            limit: query.limit.filter(|limit| *limit > 0),
        };
        let users = self.store.list(&filter).await?;
        Ok(users.iter().map(PublicIdentity::from).collect())
    }

    pub async fn add_user(
        &self,
        principal: &Principal,
        request: AddUserRequest,
    ) -> ServiceResult<PublicIdentity> {
        ensure_admin(principal)?;

        let (Some(email), Some(password), Some(raw_role)) = (
            trimmed(request.email),
            non_blank(request.password),
            trimmed(request.role),
        ) else {
            return Err(ServiceError::Validation(BAD_REQUEST.to_string()));
        };

        let role = Role::parse(&raw_role);
        if !ASSIGNABLE_ROLES.contains(&role) {
            warn!(admin_id = %principal.user_id, role = %role, "add_user rejected: role not assignable");
            return Err(ServiceError::Forbidden(FORBIDDEN_ACCESS));
        }

        let created = self
            .create_identity(trimmed(request.name), email, &password, role)
            .await?;
        info!(admin_id = %principal.user_id, user_id = %created.id, role = %created.role, "user added");
        Ok(created)
    }

    pub async fn delete_user(&self, principal: &Principal, user_id: Uuid) -> ServiceResult<()> {
        ensure_admin(principal)?;

        if !self.store.delete(user_id).await? {
            return Err(ServiceError::NotFound(USER_NOTFOUND));
        }
        info!(admin_id = %principal.user_id, user_id = %user_id, "user deleted");
        Ok(())
    }

    /// Keeps the record until the verifier itself would reject the token:
    /// the time left until `exp`, rounded up, plus the leeway and one second
    /// for whole-second expiry checks. Tokens whose expiry cannot be read are
    /// kept for the full lifetime.
    fn revocation_ttl(&self, token: &str, now: DateTime<Utc>) -> Duration {
        let grace = i64::from(self.verifier.config().leeway_seconds) + 1;
        let max = self.signer.token_ttl_seconds().max(1) + grace;
        let seconds = match self.verifier.peek_expiry(token) {
            Some(expires_at) => {
                let remaining_ms = (expires_at - now).num_milliseconds();
                let remaining = (remaining_ms + 999).div_euclid(1000);
                (remaining + grace).clamp(1, max)
            }
            None => max,
        };
        Duration::from_secs(seconds.unsigned_abs())
    }

    async fn create_identity(
        &self,
        name: Option<String>,
        email: String,
        password: &str,
        role: Role,
    ) -> ServiceResult<PublicIdentity> {
        if self.store.find_by_email(&email).await?.is_some() {
            self.metrics.registration("conflict");
            return Err(ServiceError::Conflict(EMAIL_ALREADY_EXISTS));
        }

        let password_hash = hash_password(password).map_err(ServiceError::Hashing)?;
        let identity = NewIdentity {
            name,
            email,
            password_hash,
            role,
        };
        match self.store.insert(identity).await {
            Ok(created) => {
                self.metrics.registration("created");
                Ok(PublicIdentity::from(&created))
            }
            Err(err) => {
                let err = ServiceError::from(err);
                if matches!(err, ServiceError::Conflict(_)) {
                    self.metrics.registration("conflict");
                }
                Err(err)
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn trimmed(value: Option<String>) -> Option<String> {
    non_blank(value).map(|value| value.trim().to_string())
}

/// Unpacks required fields, reporting every missing one in declaration order.
fn require<const N: usize>(
    fields: [(&'static str, Option<String>); N],
) -> ServiceResult<[String; N]> {
    let missing = fields
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ServiceError::Validation(missing_fields_message(&missing)));
    }
    Ok(fields.map(|(_, value)| value.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use chrono::Timelike;
    use common_auth::{InMemorySessionBlacklist, JwtConfig, SessionBlacklist};

    struct Harness {
        service: AuthService,
        blacklist: Arc<InMemorySessionBlacklist>,
        verifier: Arc<JwtVerifier>,
        signer: Arc<TokenSigner>,
    }

    fn harness() -> Harness {
        let config = JwtConfig::new("service-secret");
        let blacklist = Arc::new(InMemorySessionBlacklist::new());
        let signer = Arc::new(TokenSigner::new(config.clone()));
        let verifier = Arc::new(JwtVerifier::new(config));
        let service = AuthService::new(
            Arc::new(InMemoryCredentialStore::new()),
            blacklist.clone(),
            signer.clone(),
            verifier.clone(),
            Arc::new(AuthMetrics::new().unwrap()),
        );
        Harness {
            service,
            blacklist,
            verifier,
            signer,
        }
    }

    fn signup(email: &str, password: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: Some("Ann".into()),
            email: Some(email.into()),
            password: Some(password.into()),
            role: role.map(str::to_string),
        }
    }

    fn credentials(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn admin(user_id: Uuid) -> Principal {
        Principal::new(user_id, Role::Admin)
    }

    #[tokio::test]
    async fn register_then_login_round_trips_the_user_id() {
        let h = harness();
        let created = h
            .service
            .register(signup("ann@x.com", "pw1", Some("admin")))
            .await
            .unwrap();
        assert_eq!(created.role, Role::Admin);

        let outcome = h.service.login(credentials("ann@x.com", "pw1")).await.unwrap();
        assert_eq!(outcome.user, created);
        assert_eq!(outcome.expires_in, 3600);
        let claims = h.verifier.verify(&outcome.token).unwrap();
        assert_eq!(claims.user_id, created.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn register_defaults_role_to_viewer() {
        let h = harness();
        let created = h.service.register(signup("bob@x.com", "pw", None)).await.unwrap();
        assert_eq!(created.role, Role::Viewer);
    }

    #[tokio::test]
    async fn register_lists_every_missing_field_in_order() {
        let h = harness();
        let err = h
            .service
            .register(RegisterRequest {
                name: Some("  ".into()),
                ..Default::default()
            })
            .await
            .expect_err("all fields missing");
        match err {
            ServiceError::Validation(message) => assert_eq!(
                message,
                "Bad Request, Reason: Missing email & password & name"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_rejects_unknown_role() {
        let h = harness();
        let err = h
            .service
            .register(signup("ann@x.com", "pw", Some("owner")))
            .await
            .expect_err("unknown role");
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let h = harness();
        h.service.register(signup("ann@x.com", "pw", None)).await.unwrap();
        let err = h
            .service
            .register(signup("ann@x.com", "other", None))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, ServiceError::Conflict(EMAIL_ALREADY_EXISTS)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_registrations_yield_one_success() {
        let h = harness();
        let (first, second) = tokio::join!(
            h.service.register(signup("race@x.com", "pw", None)),
            h.service.register(signup("race@x.com", "pw", None)),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ServiceError::Conflict(EMAIL_ALREADY_EXISTS)))));
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_email_from_bad_password() {
        let h = harness();
        h.service.register(signup("ann@x.com", "pw1", None)).await.unwrap();

        let unknown = h
            .service
            .login(credentials("nobody@x.com", "pw1"))
            .await
            .expect_err("unknown");
        assert!(matches!(unknown, ServiceError::NotFound(USER_NOTFOUND)));

        let wrong = h
            .service
            .login(credentials("ann@x.com", "pw2"))
            .await
            .expect_err("wrong password");
        assert!(matches!(wrong, ServiceError::Auth(INCORRECT_PASSWORD)));
    }

    #[tokio::test]
    async fn logout_revokes_the_bearer_token() {
        let h = harness();
        h.service.register(signup("ann@x.com", "pw1", None)).await.unwrap();
        let token = h.service.login(credentials("ann@x.com", "pw1")).await.unwrap().token;

        h.service
            .logout(Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert!(h.blacklist.is_revoked(&token).await.unwrap());

        // Second logout is a no-op.
        h.service
            .logout(Some(&format!("Bearer {token}")))
            .await
            .unwrap();
        assert_eq!(h.blacklist.len().await, 1);
    }

    #[tokio::test]
    async fn logout_without_header_is_a_bad_request() {
        let h = harness();
        let err = h.service.logout(None).await.expect_err("no header");
        assert!(matches!(err, ServiceError::Validation(ref m) if m == BAD_REQUEST));
    }

    #[test]
    fn revocation_outlives_token_acceptance() {
        let h = harness();
        // `exp` is stored in whole seconds.
        let now = Utc::now().with_nanosecond(0).unwrap();
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            role: Role::Viewer,
        };

        let fresh = h.signer.issue_at(&subject, now).unwrap();
        assert_eq!(
            h.service.revocation_ttl(&fresh.token, now),
            Duration::from_secs(3601)
        );

        let older = h
            .signer
            .issue_at(&subject, now - chrono::Duration::minutes(50))
            .unwrap();
        assert_eq!(
            h.service.revocation_ttl(&older.token, now),
            Duration::from_secs(601)
        );

        // Partial seconds round up rather than down.
        let later = now + chrono::Duration::milliseconds(400);
        assert_eq!(
            h.service.revocation_ttl(&older.token, later),
            Duration::from_secs(601)
        );

        let stale = h
            .signer
            .issue_at(&subject, now - chrono::Duration::hours(3))
            .unwrap();
        assert_eq!(h.service.revocation_ttl(&stale.token, now), Duration::from_secs(1));

        assert_eq!(
            h.service.revocation_ttl("garbage", now),
            Duration::from_secs(3601)
        );
    }

    #[test]
    fn revocation_covers_verifier_leeway() {
        let config = JwtConfig::new("service-secret").with_leeway(30);
        let signer = Arc::new(TokenSigner::new(config.clone()));
        let service = AuthService::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemorySessionBlacklist::new()),
            signer.clone(),
            Arc::new(JwtVerifier::new(config)),
            Arc::new(AuthMetrics::new().unwrap()),
        );
        let now = Utc::now().with_nanosecond(0).unwrap();
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            role: Role::Viewer,
        };

        let issued = signer
            .issue_at(&subject, now - chrono::Duration::seconds(3598))
            .unwrap();
        assert_eq!(service.revocation_ttl(&issued.token, now), Duration::from_secs(33));

        // Already past `exp` but still inside the leeway window.
        let expired = signer
            .issue_at(&subject, now - chrono::Duration::seconds(3610))
            .unwrap();
        assert_eq!(service.revocation_ttl(&expired.token, now), Duration::from_secs(21));

        assert_eq!(service.revocation_ttl("garbage", now), Duration::from_secs(3631));
    }

    #[tokio::test]
    async fn logout_uses_the_same_bearer_rules_as_the_guard() {
        let h = harness();
        let err = h
            .service
            .logout(Some("Bearer abc extra"))
            .await
            .expect_err("trailing parts");
        assert!(matches!(err, ServiceError::Validation(ref m) if m == BAD_REQUEST));
        let err = h
            .service
            .logout(Some("Token abc"))
            .await
            .expect_err("wrong scheme");
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(h.blacklist.len().await, 0);

        h.service.logout(Some("bearer abc")).await.unwrap();
        assert!(h.blacklist.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn update_password_checks_old_password_then_rotates() {
        let h = harness();
        let created = h.service.register(signup("ann@x.com", "pw1", None)).await.unwrap();
        let principal = Principal::new(created.id, created.role.clone());

        let err = h
            .service
            .update_password(&principal, UpdatePasswordRequest::default())
            .await
            .expect_err("missing fields");
        assert!(matches!(
            err,
            ServiceError::Validation(ref m) if m == "Bad Request, Reason: Missing new password & old password"
        ));

        let err = h
            .service
            .update_password(
                &principal,
                UpdatePasswordRequest {
                    old_password: Some("nope".into()),
                    new_password: Some("pw2".into()),
                },
            )
            .await
            .expect_err("wrong old password");
        assert!(matches!(err, ServiceError::Auth(INCORRECT_PASSWORD)));

        h.service
            .update_password(
                &principal,
                UpdatePasswordRequest {
                    old_password: Some("pw1".into()),
                    new_password: Some("pw2".into()),
                },
            )
            .await
            .unwrap();
        assert!(h.service.login(credentials("ann@x.com", "pw1")).await.is_err());
        assert!(h.service.login(credentials("ann@x.com", "pw2")).await.is_ok());
    }

    #[tokio::test]
    async fn update_password_for_deleted_account_is_not_found() {
        let h = harness();
        let err = h
            .service
            .update_password(
                &Principal::new(Uuid::new_v4(), Role::Viewer),
                UpdatePasswordRequest {
                    old_password: Some("a".into()),
                    new_password: Some("b".into()),
                },
            )
            .await
            .expect_err("ghost account");
        assert!(matches!(err, ServiceError::NotFound(USER_NOTFOUND)));
    }

    #[tokio::test]
    async fn admin_operations_require_admin_role() {
        let h = harness();
        let editor = Principal::new(Uuid::new_v4(), Role::Editor);

        let err = h
            .service
            .list_users(&editor, ListUsersQuery::default())
            .await
            .expect_err("editor cannot list");
        assert!(matches!(err, ServiceError::Guard(_)));
        assert!(h.service.delete_user(&editor, Uuid::new_v4()).await.is_err());
        assert!(h
            .service
            .add_user(&editor, AddUserRequest::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn add_user_only_mints_editors_and_viewers() {
        let h = harness();
        let root = admin(Uuid::new_v4());

        let err = h
            .service
            .add_user(
                &root,
                AddUserRequest {
                    email: Some("x@x.com".into()),
                    password: Some("pw".into()),
                    role: Some("admin".into()),
                    name: None,
                },
            )
            .await
            .expect_err("admin not assignable");
        assert!(matches!(err, ServiceError::Forbidden(FORBIDDEN_ACCESS)));

        let err = h
            .service
            .add_user(
                &root,
                AddUserRequest {
                    email: Some("x@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("missing fields");
        assert!(matches!(err, ServiceError::Validation(ref m) if m == BAD_REQUEST));

        let created = h
            .service
            .add_user(
                &root,
                AddUserRequest {
                    email: Some("ed@x.com".into()),
                    password: Some("pw".into()),
                    role: Some("editor".into()),
                    name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.role, Role::Editor);
        assert!(h.service.login(credentials("ed@x.com", "pw")).await.is_ok());
    }

    #[tokio::test]
    async fn list_and_delete_users() {
        let h = harness();
        let root = admin(Uuid::new_v4());
        let ann = h.service.register(signup("ann@x.com", "pw", Some("editor"))).await.unwrap();
        h.service.register(signup("bob@x.com", "pw", None)).await.unwrap();

        let editors = h
            .service
            .list_users(
                &root,
                ListUsersQuery {
                    role: Some("editor".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(editors, vec![ann.clone()]);

        let page = h
            .service
            .list_users(
                &root,
                ListUsersQuery {
                    limit: Some(1),
                    offset: Some(1),
                    role: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        let unbounded = h
            .service
            .list_users(
                &root,
                ListUsersQuery {
                    limit: Some(0),
                    offset: None,
                    role: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(unbounded.len(), 2);

        h.service.delete_user(&root, ann.id).await.unwrap();
        let err = h
            .service
            .delete_user(&root, ann.id)
            .await
            .expect_err("already deleted");
        assert!(matches!(err, ServiceError::NotFound(USER_NOTFOUND)));
    }
}
