use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{Ack, AppState, Payload};
use crate::auth::{open_session, verify_password_task, AuthContext};
use crate::error::{AppError, ErrorBody};
use crate::models::{Role, Session, User};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Public view of a user account.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub role: Role,
    pub permissions: Vec<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, body = LoginResponse),
        (status = 400, body = ErrorBody),
        (status = 401, description = "Unknown user or wrong password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let username = payload.username.trim();
    let password = payload.password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    // Unknown user and wrong password must be indistinguishable.
    let user = state
        .storage
        .find_by_key::<User>(username)?
        .ok_or(AppError::InvalidCredentials)?;
    if !verify_password_task(password.to_string(), user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let token = open_session(&state.storage, &user, &state.config)?;
    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        user: UserProfile::from(&user),
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/me",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, body = UserProfile), (status = 401, body = ErrorBody))
)]
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<UserProfile> {
    Json(UserProfile::from(&auth.user))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, body = Ack), (status = 401, body = ErrorBody))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Ack>, AppError> {
    state.storage.delete::<Session>(auth.session_id)?;
    info!(user_id = auth.user.id, "session revoked");
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use crate::models::Role;
    use crate::rest::testing::{TestApp, ADMIN_PASSWORD};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_returns_profile_and_permission_list() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": " admin ", "password": ADMIN_PASSWORD })),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "admin");
        assert_eq!(body["role"], "admin");
        assert_eq!(body["permissions"], json!(["dashboard"]));
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_look_the_same() {
        let app = TestApp::new();
        let wrong = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": "admin", "password": "nope" })),
            )
            .await;
        let unknown = app
            .call(
                Method::POST,
                "/api/login",
                None,
                Some(json!({ "username": "ghost", "password": "nope" })),
            )
            .await;

        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
        assert_eq!(wrong.1, json!({ "error": "Invalid username or password" }));
    }

    #[tokio::test]
    async fn test_blank_credentials_are_rejected() {
        let app = TestApp::new();
        let (status, body) = app
            .call(Method::POST, "/api/login", None, Some(json!({ "username": "admin" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username and password are required");
    }

    #[tokio::test]
    async fn test_me_and_logout() {
        let app = TestApp::new();
        app.add_user("maria", "maria-pass", Role::User);
        let token = app.login("maria", "maria-pass").await;

        let (status, body) = app.call(Method::GET, "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "maria");
        assert_eq!(body["role"], "user");

        let (status, _) = app.call(Method::POST, "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.call(Method::GET, "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }
}
