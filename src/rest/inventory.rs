use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{Ack, AppState, Payload, RecordId};
use crate::attributes::{AttributeSchema, AttributeValue};
use crate::error::{AppError, ErrorBody};
use crate::models::{default_condition, AttributeDefinition, Product};
use crate::storage::RecordReader;

/// Product as seen by API clients: attributes keyed by attribute name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ProductView {
    pub id: u64,
    pub name: String,
    pub sku: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub condition: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock_quantity: i64,
    pub vat_rate: f64,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub images: Vec<String>,
}

impl ProductView {
    fn new(product: Product, schema: &AttributeSchema) -> Self {
        Self {
            attributes: schema.decode(&product.attributes),
            id: product.id,
            name: product.name,
            sku: product.sku,
            brand: product.brand,
            category: product.category,
            condition: product.condition,
            description: product.description,
            price: product.price,
            stock_quantity: product.stock_quantity,
            vat_rate: product.vat_rate,
            images: product.images,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ProductInput {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    /// Percent; the configured default applies when omitted.
    #[serde(default)]
    pub vat_rate: Option<f64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductInput {
    fn into_product(self, schema: &AttributeSchema, default_vat_rate: f64) -> Result<Product, AppError> {
        if self.name.trim().is_empty() || self.sku.trim().is_empty() {
            return Err(AppError::Validation("Name and SKU are required".to_string()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(AppError::Validation("Price must be a non-negative number".to_string()));
        }
        let vat_rate = self.vat_rate.unwrap_or(default_vat_rate);
        if !vat_rate.is_finite() || vat_rate < 0.0 {
            return Err(AppError::Validation("VAT rate must be a non-negative number".to_string()));
        }

        Ok(Product {
            id: 0,
            attributes: schema.encode(self.attributes)?,
            name: self.name,
            sku: self.sku,
            brand: self.brand,
            category: self.category,
            condition: self.condition,
            description: self.description,
            price: self.price,
            stock_quantity: self.stock_quantity,
            vat_rate,
            images: self.images,
        })
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/inventory", get(list_products).post(create_product))
        .route("/inventory/:id", put(update_product).delete(delete_product))
}

fn schema(reader: &impl RecordReader) -> Result<AttributeSchema, AppError> {
    Ok(AttributeSchema::new(reader.list::<AttributeDefinition>()?))
}

#[utoipa::path(
    get,
    path = "/api/inventory",
    tag = "inventory",
    security(("bearer" = [])),
    responses((status = 200, body = [ProductView]), (status = 401, body = ErrorBody))
)]
pub async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ProductView>>, AppError> {
    let scope = state.storage.read();
    let schema = schema(&scope)?;
    let products = scope
        .list::<Product>()?
        .into_iter()
        .map(|product| ProductView::new(product, &schema))
        .collect();
    Ok(Json(products))
}

#[utoipa::path(
    post,
    path = "/api/inventory",
    tag = "inventory",
    security(("bearer" = [])),
    request_body = ProductInput,
    responses(
        (status = 200, body = Ack),
        (status = 400, description = "Invalid fields, unknown attribute or duplicate SKU", body = ErrorBody)
    )
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<ProductInput>,
) -> Result<Json<Ack>, AppError> {
    let scope = state.storage.write();
    let product = input.into_product(&schema(&scope)?, state.config.finance.default_vat_rate)?;
    let stored = scope.insert(product)?;
    Ok(Json(Ack::created(stored.id)))
}

#[utoipa::path(
    put,
    path = "/api/inventory/{id}",
    tag = "inventory",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, body = Ack),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    RecordId(id): RecordId,
    Payload(input): Payload<ProductInput>,
) -> Result<Json<Ack>, AppError> {
    let scope = state.storage.write();
    let product = input.into_product(&schema(&scope)?, state.config.finance.default_vat_rate)?;
    scope.update(id, product)?;
    Ok(Json(Ack::ok()))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/{id}",
    tag = "inventory",
    security(("bearer" = [])),
    params(("id" = u64, Path, description = "Product id")),
    responses((status = 200, body = Ack))
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    RecordId(id): RecordId,
) -> Result<Json<Ack>, AppError> {
    state.storage.delete::<Product>(id)?;
    Ok(Json(Ack::ok()))
}
