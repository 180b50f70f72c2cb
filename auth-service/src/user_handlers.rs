use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common_auth::{ensure_admin, AuthContext};
use common_http_errors::{respond, ApiError};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, BAD_REQUEST, USER_NOTFOUND};
use crate::service::{
    AddUserRequest, ListUsersQuery, LoginRequest, RegisterRequest, UpdatePasswordRequest,
};
use crate::AppState;

pub const USER_CREATED_SUCCESSFULLY: &str = "User created successfully.";
pub const USER_LOGGEDIN: &str = "Login successful.";
pub const USER_LOGGEDOUT: &str = "Logout Success.";
pub const USER_RETRIEVED: &str = "Users retrieved successfully.";
pub const USER_DELETED: &str = "User deleted successfully";

type HandlerResult = Result<Response, ServiceError>;

/// Malformed bodies get the same envelope as every other validation failure.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        debug!(error = %rejection, "rejected request body");
        ServiceError::Validation(BAD_REQUEST.to_string())
    })
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.metrics.render().map_err(ApiError::internal)
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> HandlerResult {
    state.service.register(body(payload)?).await?;
    Ok(respond::<()>(StatusCode::CREATED, None, USER_CREATED_SUCCESSFULLY))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> HandlerResult {
    let outcome = state.service.login(body(payload)?).await?;
    Ok(respond(StatusCode::OK, Some(outcome), USER_LOGGEDIN))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> HandlerResult {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    state.service.logout(authorization).await?;
    Ok(respond::<()>(StatusCode::OK, None, USER_LOGGEDOUT))
}

pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> HandlerResult {
    state
        .service
        .update_password(&auth.principal, body(payload)?)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> HandlerResult {
    let Query(query) = query.map_err(|rejection| {
        debug!(error = %rejection, "rejected query string");
        ServiceError::Validation(BAD_REQUEST.to_string())
    })?;
    let users = state.service.list_users(&auth.principal, query).await?;
    Ok(respond(StatusCode::OK, Some(users), USER_RETRIEVED))
}

pub async fn add_user(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<AddUserRequest>, JsonRejection>,
) -> HandlerResult {
    state
        .service
        .add_user(&auth.principal, body(payload)?)
        .await?;
    Ok(respond::<()>(StatusCode::CREATED, None, USER_CREATED_SUCCESSFULLY))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> HandlerResult {
    ensure_admin(&auth.principal)?;
    // An id that cannot name an account is reported like a missing one.
    let user_id =
        Uuid::parse_str(&user_id).map_err(|_| ServiceError::NotFound(USER_NOTFOUND))?;
    state.service.delete_user(&auth.principal, user_id).await?;
    Ok(respond::<()>(StatusCode::OK, None, USER_DELETED))
}
