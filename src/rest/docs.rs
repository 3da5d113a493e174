use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::{attributes, auth, fleet, finance, inventory, messages, pos, users};
use super::{Ack, Health};
use crate::attributes::{AttributeKind, AttributeValue};
use crate::error::ErrorBody;
use crate::models::{
    AttributeDefinition, Brand, Contract, FlowKind, Invoice, Message, Role, ServiceOrder, Task,
    Transaction, Vehicle,
};
use crate::reports::{DashboardStats, IncomeStatement, LineStatement, StatementFigures};

#[derive(OpenApi)]
#[openapi(
    info(title = "TechFix ERP API", description = "Back office REST API"),
    paths(
        super::health_handler,
        auth::login,
        auth::me,
        auth::logout,
        inventory::list_products,
        inventory::create_product,
        inventory::update_product,
        inventory::delete_product,
        attributes::list_attributes,
        attributes::create_attribute,
        attributes::delete_attribute,
        users::list_users,
        users::create_user,
        users::update_user,
        users::delete_user,
        fleet::optimize_route,
        messages::list_messages,
        messages::send_message,
        pos::checkout,
        finance::dashboard,
        finance::dre,
    ),
    components(schemas(
        Ack,
        Health,
        ErrorBody,
        Role,
        auth::LoginRequest,
        auth::LoginResponse,
        auth::UserProfile,
        users::UserInput,
        inventory::ProductView,
        inventory::ProductInput,
        attributes::AttributeInput,
        AttributeDefinition,
        AttributeKind,
        AttributeValue,
        Brand,
        Vehicle,
        Task,
        fleet::OptimizeRequest,
        fleet::OptimizeResponse,
        Message,
        messages::MessageInput,
        FlowKind,
        Transaction,
        Invoice,
        Contract,
        ServiceOrder,
        pos::CartItem,
        pos::CheckoutRequest,
        pos::CheckoutReceipt,
        DashboardStats,
        StatementFigures,
        LineStatement,
        IncomeStatement,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login and sessions"),
        (name = "inventory", description = "Products and attribute definitions"),
        (name = "users", description = "Accounts and roles"),
        (name = "fleet", description = "Route planning and driver messages"),
        (name = "pos", description = "Point of sale"),
        (name = "finance", description = "Dashboard and income statement"),
        (name = "system", description = "Liveness"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
