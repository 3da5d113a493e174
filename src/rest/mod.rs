//! REST API for the back office, served under `/api`.
//!
//! Every route except `/api/login`, `/health` and the OpenAPI document sits
//! behind [`auth_middleware`], which resolves the `Authorization` header to an
//! [`AuthContext`] and stores it in the request extensions.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::auth::{authenticate, bearer_token, AuthContext};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Brand, Contract, Invoice, ServiceOrder, Task, Transaction, Vehicle};
use crate::storage::Storage;

mod attributes;
mod auth;
mod crud;
mod docs;
mod extract;
mod finance;
mod fleet;
mod inventory;
mod messages;
mod pos;
mod users;

pub use extract::{Payload, RecordId};

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub storage: Storage,
    pub config: AppConfig,
}

/// Outcome of a mutation. `id` is set when a record was created.
#[derive(Serialize, Debug, ToSchema)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true, id: None }
    }

    pub fn created(id: u64) -> Self {
        Self {
            success: true,
            id: Some(id),
        }
    }
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let context: AuthContext = authenticate(
        &state.storage,
        bearer_token(auth_header),
        state.config.jwt_secret.as_bytes(),
    )?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Create the Axum router with every back-office endpoint.
pub fn create_router(storage: Storage, config: AppConfig) -> Router {
    let state = Arc::new(AppState { storage, config });

    let guarded = Router::new()
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .merge(inventory::routes())
        .merge(attributes::routes())
        .merge(users::routes())
        .merge(crud::routes::<Brand>("/brands"))
        .merge(crud::routes::<Vehicle>("/fleet"))
        .merge(crud::routes::<Task>("/tasks"))
        .merge(crud::routes::<Transaction>("/transactions"))
        .merge(crud::routes::<Invoice>("/invoices"))
        .merge(crud::routes::<Contract>("/contracts"))
        .merge(crud::routes::<ServiceOrder>("/service-orders"))
        .merge(fleet::routes())
        .merge(messages::routes())
        .merge(pos::routes())
        .merge(finance::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .route("/login", post(auth::login))
        .merge(guarded);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize, Debug, ToSchema)]
pub struct Health {
    pub status: String,
    pub version: String,
}

#[utoipa::path(get, path = "/health", tag = "system", responses((status = 200, body = Health)))]
pub async fn health_handler() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::auth::hash_password;
    use crate::models::{default_permissions, Role, User};
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt; // For .oneshot() testing

    pub const ADMIN_PASSWORD: &str = "admin-pass";

    fn insert_user(storage: &Storage, config: &AppConfig, username: &str, password: &str, role: Role) -> User {
        storage
            .insert(User {
                id: 0,
                username: username.to_string(),
                password_hash: hash_password(password, config.bcrypt_cost).unwrap(),
                role,
                permissions: default_permissions(),
            })
            .unwrap()
    }

    pub struct TestApp {
        pub router: Router,
        pub storage: Storage,
        pub config: AppConfig,
        pub admin: User,
    }

    impl TestApp {
        pub fn new() -> Self {
            let storage = Storage::temporary().expect("temp store");
            let config = AppConfig::for_tests();
            let admin = insert_user(&storage, &config, "admin", ADMIN_PASSWORD, Role::Admin);
            let router = create_router(storage.clone(), config.clone());
            Self {
                router,
                storage,
                config,
                admin,
            }
        }

        pub fn add_user(&self, username: &str, password: &str, role: Role) -> User {
            insert_user(&self.storage, &self.config, username, password, role)
        }

        pub async fn login(&self, username: &str, password: &str) -> String {
            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/login",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "login failed: {body}");
            body["token"].as_str().unwrap().to_string()
        }

        pub async fn admin_token(&self) -> String {
            self.login("admin", ADMIN_PASSWORD).await
        }

        pub async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }
}
