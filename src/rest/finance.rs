use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use super::AppState;
use crate::error::{AppError, ErrorBody};
use crate::reports::{dashboard_stats, load_income_statement, DashboardStats, IncomeStatement};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/stats", get(dashboard))
        .route("/finance/dre", get(dre))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "finance",
    security(("bearer" = [])),
    responses((status = 200, body = DashboardStats), (status = 401, body = ErrorBody))
)]
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>, AppError> {
    let scope = state.storage.read();
    let stats = dashboard_stats(&scope, state.config.stock_alert_threshold)?;
    Ok(Json(stats))
}

/// Income statement in total and per business line.
#[utoipa::path(
    get,
    path = "/api/finance/dre",
    tag = "finance",
    security(("bearer" = [])),
    responses((status = 200, body = IncomeStatement), (status = 401, body = ErrorBody))
)]
pub async fn dre(State(state): State<Arc<AppState>>) -> Result<Json<IncomeStatement>, AppError> {
    let scope = state.storage.read();
    let statement = load_income_statement(&scope, &state.config.finance)?;
    Ok(Json(statement))
}

#[cfg(test)]
mod tests {
    use crate::rest::testing::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_stock_alert_threshold_is_strict() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        let (_, body) = app
            .call(
                Method::POST,
                "/api/inventory",
                Some(&token),
                Some(json!({ "name": "SSD", "sku": "SSD-1", "price": 80.0, "stock_quantity": 20 })),
            )
            .await;
        let uri = format!("/api/inventory/{}", body["id"]);

        for (stock, alerts) in [(9, 1), (10, 0), (0, 1)] {
            let (status, _) = app
                .call(
                    Method::PUT,
                    &uri,
                    Some(&token),
                    Some(json!({ "name": "SSD", "sku": "SSD-1", "price": 80.0, "stock_quantity": stock })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            let (_, stats) = app.call(Method::GET, "/api/dashboard/stats", Some(&token), None).await;
            assert_eq!(stats["stockAlerts"], alerts, "stock {stock}");
        }
    }

    #[tokio::test]
    async fn test_dashboard_counts_active_contracts() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        for status in ["active", "active", "expired"] {
            app.call(
                Method::POST,
                "/api/contracts",
                Some(&token),
                Some(json!({ "customer_name": "ACME", "status": status })),
            )
            .await;
        }
        let (status, stats) = app.call(Method::GET, "/api/dashboard/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats, json!({ "revenue": 0.0, "activeContracts": 2, "stockAlerts": 0 }));
    }

    #[tokio::test]
    async fn test_dre_endpoint_reports_lines() {
        let app = TestApp::new();
        let token = app.admin_token().await;
        for tx in [
            json!({ "date": "2026-02-01", "description": "Sales", "type": "in", "amount": 1230.0 }),
            json!({ "date": "2026-02-02", "description": "Stock", "category": "COGS", "type": "out", "amount": 300.0 }),
            json!({ "date": "2026-02-03", "description": "Licences", "type": "in", "amount": 246.0, "business_type": "software" }),
        ] {
            let (status, _) = app.call(Method::POST, "/api/transactions", Some(&token), Some(tx)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = app.call(Method::GET, "/api/finance/dre", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        // 1476 gross, 276 VAT inside it, 300 COGS, no opex.
        assert_eq!(body["grossRevenue"], 1476.0);
        assert_eq!(body["taxes"], 276.0);
        assert_eq!(body["grossProfit"], 900.0);
        assert_eq!(body["netProfit"], 720.0);
        assert_eq!(body["lines"][0]["businessType"], "hardware");
        assert_eq!(body["lines"][0]["cogs"], 300.0);
        assert_eq!(body["lines"][1]["netRevenue"], 200.0);
    }
}
