use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{Ack, AppState, Payload, RecordId};
use crate::attributes::{derive_name, AttributeKind};
use crate::error::{AppError, ErrorBody};
use crate::models::AttributeDefinition;

#[derive(Deserialize, Debug, ToSchema)]
pub struct AttributeInput {
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub options: Vec<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/attributes", get(list_attributes).post(create_attribute))
        .route("/attributes/:id", delete(delete_attribute))
}

#[utoipa::path(
    get,
    path = "/api/attributes",
    tag = "inventory",
    security(("bearer" = [])),
    responses((status = 200, body = [AttributeDefinition]))
)]
pub async fn list_attributes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AttributeDefinition>>, AppError> {
    Ok(Json(state.storage.list()?))
}

/// The internal name is derived from the label; a label that derives an
/// existing name is a conflict.
#[utoipa::path(
    post,
    path = "/api/attributes",
    tag = "inventory",
    security(("bearer" = [])),
    request_body = AttributeInput,
    responses((status = 200, body = Ack), (status = 400, body = ErrorBody))
)]
pub async fn create_attribute(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<AttributeInput>,
) -> Result<Json<Ack>, AppError> {
    if input.label.trim().is_empty() {
        return Err(AppError::Validation("Attribute label is required".to_string()));
    }
    if input.kind != AttributeKind::Select && !input.options.is_empty() {
        return Err(AppError::Validation(
            "Only select attributes take options".to_string(),
        ));
    }

    let definition = AttributeDefinition {
        id: 0,
        name: derive_name(&input.label),
        label: input.label,
        kind: input.kind,
        options: input.options,
    };
    let stored = state.storage.insert(definition)?;
    Ok(Json(Ack::created(stored.id)))
}

/// Values stored under the definition stay on disk but are no longer served.
#[utoipa::path(
    delete,
    path = "/api/attributes/{id}",
    tag = "inventory",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "Attribute definition id")),
    responses((status = 200, body = Ack))
)]
pub async fn delete_attribute(
    State(state): State<Arc<AppState>>,
    RecordId(id): RecordId,
) -> Result<Json<Ack>, AppError> {
    state.storage.delete::<AttributeDefinition>(id)?;
    Ok(Json(Ack::ok()))
}

#[cfg(test)]
mod tests {
    use crate::rest::testing::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_label_derives_name_and_collisions_conflict() {
        let app = TestApp::new();
        let token = app.admin_token().await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/attributes",
                Some(&token),
                Some(json!({ "label": "Screen Size", "type": "number" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.call(Method::GET, "/api/attributes", Some(&token), None).await;
        assert_eq!(body[0]["name"], "screen_size");
        assert_eq!(body[0]["label"], "Screen Size");
        assert_eq!(body[0]["type"], "number");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/attributes",
                Some(&token),
                Some(json!({ "label": "screen  size" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Attribute name must be unique");
    }

    #[tokio::test]
    async fn test_select_attributes_restrict_values() {
        let app = TestApp::new();
        let token = app.admin_token().await;

        let (status, _) = app
            .call(
                Method::POST,
                "/api/attributes",
                Some(&token),
                Some(json!({ "label": "Form Factor", "type": "select", "options": ["ATX", "ITX"] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/attributes",
                Some(&token),
                Some(json!({ "label": "Colour", "options": ["black"] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .call(
                Method::POST,
                "/api/inventory",
                Some(&token),
                Some(json!({
                    "name": "B650 board",
                    "sku": "MB-1",
                    "price": 199.0,
                    "attributes": { "form_factor": "mATX" }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "`mATX` is not an option of attribute `form_factor`");
    }
}
