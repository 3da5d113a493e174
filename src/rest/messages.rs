use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{Ack, AppState, Payload};
use crate::auth::AuthContext;
use crate::error::{AppError, ErrorBody};
use crate::models::{Message, User};
use crate::storage::RecordReader;

#[derive(Deserialize, Debug, ToSchema)]
pub struct MessageInput {
    pub receiver_id: u64,
    pub content: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/messages", get(list_messages).post(send_message))
}

/// Admins see every message; everyone else sees only conversations they
/// take part in.
#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "fleet",
    security(("bearer" = [])),
    responses((status = 200, body = [Message]))
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state.storage.list::<Message>()?;
    if auth.is_admin() {
        return Ok(Json(messages));
    }
    let me = auth.user.id;
    Ok(Json(
        messages
            .into_iter()
            .filter(|message| message.sender_id == me || message.receiver_id == me)
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "fleet",
    security(("bearer" = [])),
    request_body = MessageInput,
    responses((status = 200, body = Ack), (status = 400, body = ErrorBody))
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Payload(input): Payload<MessageInput>,
) -> Result<Json<Ack>, AppError> {
    if input.content.trim().is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }

    let scope = state.storage.write();
    if scope.get::<User>(input.receiver_id)?.is_none() {
        return Err(AppError::Validation("Unknown receiver".to_string()));
    }
    let stored = scope.insert(Message {
        id: 0,
        sender_id: auth.user.id,
        receiver_id: input.receiver_id,
        content: input.content,
        timestamp: Utc::now(),
    })?;
    Ok(Json(Ack::created(stored.id)))
}

#[cfg(test)]
mod tests {
    use crate::models::Role;
    use crate::rest::testing::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_messages_are_scoped_to_participants() {
        let app = TestApp::new();
        let driver = app.add_user("driver", "driver-pass", Role::Driver);
        let clerk = app.add_user("clerk", "clerk-pass", Role::User);
        let admin_token = app.admin_token().await;
        let driver_token = app.login("driver", "driver-pass").await;
        let clerk_token = app.login("clerk", "clerk-pass").await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/messages",
                Some(&admin_token),
                Some(json!({ "receiver_id": driver.id, "content": "Pick up at 10:00" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app.call(
            Method::POST,
            "/api/messages",
            Some(&clerk_token),
            Some(json!({ "receiver_id": app.admin.id, "content": "Stock count done" })),
        )
        .await;

        let (_, body) = app.call(Method::GET, "/api/messages", Some(&driver_token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["sender_id"], app.admin.id);
        assert_eq!(body[0]["content"], "Pick up at 10:00");

        let (_, body) = app.call(Method::GET, "/api/messages", Some(&clerk_token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["sender_id"], clerk.id);

        let (_, body) = app.call(Method::GET, "/api/messages", Some(&admin_token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_message_needs_a_known_receiver() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        let (status, body) = app
            .call(
                Method::POST,
                "/api/messages",
                Some(&token),
                Some(json!({ "receiver_id": 77, "content": "hello" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown receiver");
    }
}
