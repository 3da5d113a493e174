use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{AppState, Payload};
use crate::error::{AppError, ErrorBody};
use crate::models::{default_business_type, Invoice, Product};
use crate::reports::round_cents;
use crate::storage::RecordReader;

const WALK_IN_CUSTOMER: &str = "Walk-in customer";

#[derive(Deserialize, Debug, ToSchema)]
pub struct CartItem {
    /// Product id.
    pub id: u64,
    pub quantity: i64,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub invoice_id: u64,
    pub subtotal: f64,
    pub vat: f64,
    pub total: f64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/pos/checkout", post(checkout))
}

/// Sell the cart: decrement stock and record a paid invoice. Prices are net;
/// VAT is added per product rate. Nothing is written unless every line can
/// be fulfilled.
#[utoipa::path(
    post,
    path = "/api/pos/checkout",
    tag = "pos",
    security(("bearer" = [])),
    request_body = CheckoutRequest,
    responses(
        (status = 200, body = CheckoutReceipt),
        (status = 400, description = "Empty cart, bad quantity or insufficient stock", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Payload(request): Payload<CheckoutRequest>,
) -> Result<Json<CheckoutReceipt>, AppError> {
    if request.items.is_empty() {
        return Err(AppError::Validation("Cart is empty".to_string()));
    }
    let mut quantities: BTreeMap<u64, i64> = BTreeMap::new();
    for item in &request.items {
        if item.quantity <= 0 {
            return Err(AppError::Validation("Quantity must be positive".to_string()));
        }
        let merged = quantities.entry(item.id).or_default();
        *merged = merged
            .checked_add(item.quantity)
            .ok_or_else(|| AppError::Validation("Quantity too large".to_string()))?;
    }

    let scope = state.storage.write();
    let mut lines = Vec::with_capacity(quantities.len());
    for (id, quantity) in quantities {
        let product = scope
            .get::<Product>(id)?
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;
        let remaining = product
            .stock_quantity
            .checked_sub(quantity)
            .filter(|remaining| *remaining >= 0)
            .ok_or_else(|| AppError::Validation(format!("Insufficient stock for {}", product.sku)))?;
        lines.push((product, quantity, remaining));
    }

    let mut subtotal = 0.0;
    let mut vat = 0.0;
    for (product, quantity, _) in &lines {
        let net = product.price * *quantity as f64;
        subtotal += net;
        vat += net * product.vat_rate / 100.0;
    }
    let subtotal = round_cents(subtotal);
    let vat = round_cents(vat);
    let total = round_cents(subtotal + vat);

    for (mut product, _, remaining) in lines {
        product.stock_quantity = remaining;
        scope.update(product.id, product)?;
    }

    let customer_name = request
        .customer_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| WALK_IN_CUSTOMER.to_string());
    let invoice = scope.insert(Invoice {
        id: 0,
        customer_name,
        customer_email: request.customer_email,
        issue_date: Utc::now(),
        total_amount: total,
        vat_amount: vat,
        status: "paid".to_string(),
        business_type: default_business_type(),
    })?;

    info!(invoice_id = invoice.id, total, "sale completed");
    Ok(Json(CheckoutReceipt {
        invoice_id: invoice.id,
        subtotal,
        vat,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::CheckoutReceipt;
    use crate::models::{Invoice, Product};
    use crate::rest::testing::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    async fn product(app: &TestApp, token: &str, sku: &str, price: f64, stock: i64) -> u64 {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/inventory",
                Some(token),
                Some(json!({ "name": sku, "sku": sku, "price": price, "stock_quantity": stock })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_checkout_decrements_stock_and_raises_revenue() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        let mouse = product(&app, &token, "MOUSE", 10.0, 12).await;
        let cable = product(&app, &token, "CABLE", 2.5, 40).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/pos/checkout",
                Some(&token),
                Some(json!({
                    "items": [
                        { "id": mouse, "quantity": 2 },
                        { "id": cable, "quantity": 4 },
                        { "id": mouse, "quantity": 1 }
                    ],
                    "total": 999
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let receipt: CheckoutReceipt = serde_json::from_value(body).unwrap();
        assert_eq!(receipt.subtotal, 40.0);
        assert_eq!(receipt.vat, 9.2);
        assert_eq!(receipt.total, 49.2);

        let stored = app.storage.get::<Product>(mouse).unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 9);
        let invoice = app.storage.get::<Invoice>(receipt.invoice_id).unwrap().unwrap();
        assert_eq!(invoice.status, "paid");
        assert_eq!(invoice.customer_name, "Walk-in customer");

        let (_, stats) = app.call(Method::GET, "/api/dashboard/stats", Some(&token), None).await;
        assert_eq!(stats["revenue"], 49.2);
        // Stock of 9 is now below the alert threshold.
        assert_eq!(stats["stockAlerts"], 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        let mouse = product(&app, &token, "MOUSE", 10.0, 12).await;
        let gpu = product(&app, &token, "GPU", 600.0, 1).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/pos/checkout",
                Some(&token),
                Some(json!({ "items": [{ "id": mouse, "quantity": 1 }, { "id": gpu, "quantity": 2 }] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Insufficient stock for GPU");

        assert_eq!(app.storage.get::<Product>(mouse).unwrap().unwrap().stock_quantity, 12);
        assert_eq!(app.storage.count::<Invoice>().unwrap(), 0);

        let (status, _) = app
            .call(Method::POST, "/api/pos/checkout", Some(&token), Some(json!({ "items": [] })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_merged_quantities_that_overflow_are_rejected() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        let mouse = product(&app, &token, "MOUSE", 10.0, 12).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/pos/checkout",
                Some(&token),
                Some(json!({ "items": [
                    { "id": mouse, "quantity": i64::MAX },
                    { "id": mouse, "quantity": 2 }
                ] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Quantity too large");
        assert_eq!(app.storage.get::<Product>(mouse).unwrap().unwrap().stock_quantity, 12);
        assert_eq!(app.storage.count::<Invoice>().unwrap(), 0);

        let (status, _) = app
            .call(
                Method::POST,
                "/api/pos/checkout",
                Some(&token),
                Some(json!({ "items": [{ "id": mouse, "quantity": i64::MAX }] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.storage.get::<Product>(mouse).unwrap().unwrap().stock_quantity, 12);
    }
}
