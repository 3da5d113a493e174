use axum::{
    extract::State,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::auth::UserProfile;
use super::{Ack, AppState, Payload, RecordId};
use crate::auth::{hash_password_task, revoke_user_sessions, AuthContext};
use crate::error::{AppError, ErrorBody};
use crate::models::{default_permissions, Role, User};
use crate::storage::RecordReader;

/// Create or full-replace body. Omitted role and permissions fall back to
/// `user` and `["dashboard"]`; an omitted or blank password on replace keeps
/// the current one.
#[derive(Deserialize, Debug, ToSchema)]
pub struct UserInput {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

impl UserInput {
    fn username(&self) -> Result<String, AppError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        Ok(username.to_string())
    }

    fn new_password(&self) -> Option<&str> {
        self.password
            .as_deref()
            .map(str::trim)
            .filter(|password| !password.is_empty())
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, body = [UserProfile]))
)]
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.storage.list::<User>()?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    security(("bearer" = [])),
    request_body = UserInput,
    responses(
        (status = 200, body = Ack),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Payload(input): Payload<UserInput>,
) -> Result<Json<Ack>, AppError> {
    auth.require_admin()?;
    let username = input.username()?;
    let password = input
        .new_password()
        .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

    let password_hash = hash_password_task(password.to_string(), state.config.bcrypt_cost).await?;
    let user = User {
        id: 0,
        username,
        password_hash,
        role: input.role.unwrap_or_default(),
        permissions: input.permissions.unwrap_or_else(default_permissions),
    };
    let stored = state.storage.insert(user)?;
    info!(user_id = stored.id, username = %stored.username, role = %stored.role, "user created");
    Ok(Json(Ack::created(stored.id)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "User id")),
    request_body = UserInput,
    responses(
        (status = 200, body = Ack),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    RecordId(id): RecordId,
    Payload(input): Payload<UserInput>,
) -> Result<Json<Ack>, AppError> {
    auth.require_admin()?;
    let username = input.username()?;
    // Hash before taking the write gate.
    let new_hash = match input.new_password() {
        Some(password) => {
            Some(hash_password_task(password.to_string(), state.config.bcrypt_cost).await?)
        }
        None => None,
    };

    let scope = state.storage.write();
    let current = scope
        .get::<User>(id)?
        .ok_or_else(|| AppError::NotFound(format!("users record {id} not found")))?;
    let user = User {
        id,
        username,
        password_hash: new_hash.unwrap_or(current.password_hash),
        role: input.role.unwrap_or_default(),
        permissions: input.permissions.unwrap_or_else(default_permissions),
    };
    scope.update(id, user)?;
    Ok(Json(Ack::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "User id")),
    responses((status = 200, body = Ack), (status = 403, body = ErrorBody))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    RecordId(id): RecordId,
) -> Result<Json<Ack>, AppError> {
    auth.require_admin()?;
    if id == auth.user.id {
        return Err(AppError::Forbidden("Cannot delete yourself".to_string()));
    }

    let scope = state.storage.write();
    if scope.delete::<User>(id)?.is_some() {
        let revoked = revoke_user_sessions(&scope, id)?;
        info!(user_id = id, revoked, "user deleted");
    }
    Ok(Json(Ack::ok()))
}
