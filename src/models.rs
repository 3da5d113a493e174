use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

use crate::attributes::{AttributeKind, AttributeValue};
use crate::storage::Record;

/// Implements [`Record`] for a struct with a `pub id: u64` field.
macro_rules! record {
    ($ty:ty, $table:literal) => {
        record!($ty, $table, |_record| None, "Record must be unique");
    };
    ($ty:ty, $table:literal, |$record:ident| $key:expr, $conflict:literal) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;
            const CONFLICT: &'static str = $conflict;

            fn id(&self) -> u64 {
                self.id
            }

            fn set_id(&mut self, id: u64) {
                self.id = id;
            }

            fn unique_key(&self) -> Option<String> {
                let $record = self;
                $key
            }
        }
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    Driver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Driver => "driver",
        })
    }
}

pub fn default_permissions() -> Vec<String> {
    vec!["dashboard".to_string()]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

record!(User, "users", |user| Some(user.username.clone()), "Username must be unique");

/// Server-side half of an issued token. Deleting the row revokes the token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    #[serde(default)]
    pub id: u64,
    pub sid: String,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

record!(Session, "sessions", |session| Some(session.sid.clone()), "Session id collision");

/// JWT claims. `sub` is the user id, `sid` the session row's key.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthClaims {
    pub sub: String,
    pub sid: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn default_condition() -> String {
    "new".to_string()
}

pub const DEFAULT_VAT_RATE: f64 = 23.0;

pub fn default_vat_rate() -> f64 {
    DEFAULT_VAT_RATE
}

/// Stored product. Attribute values are keyed by definition id; the REST layer
/// translates to and from attribute names.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    #[serde(default)]
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
    #[serde(default)]
    pub attributes: BTreeMap<u64, AttributeValue>,
    #[serde(default)]
    pub images: Vec<String>,
}

record!(Product, "products", |product| Some(product.sku.clone()), "SKU must be unique");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Brand {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

record!(Brand, "brands", |brand| Some(brand.name.clone()), "Brand name must be unique");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AttributeDefinition {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeKind,
    /// Allowed values for `select` attributes. Empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

record!(
    AttributeDefinition,
    "attribute_definitions",
    |definition| Some(definition.name.clone()),
    "Attribute name must be unique"
);

fn default_vehicle_status() -> String {
    "available".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Vehicle {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub driver_id: Option<u64>,
    #[serde(default = "default_vehicle_status")]
    pub status: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

record!(Vehicle, "vehicles");

fn default_task_status() -> String {
    "pending".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Task {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Minutes on site.
    #[serde(default)]
    pub duration: u32,
    #[serde(default = "default_task_status")]
    pub status: String,
    #[serde(default)]
    pub vehicle_id: Option<u64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub order_index: i64,
}

record!(Task, "tasks");

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Message {
    #[serde(default)]
    pub id: u64,
    pub sender_id: u64,
    pub receiver_id: u64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

record!(Message, "messages");

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    In,
    Out,
}

pub fn default_business_type() -> String {
    "hardware".to_string()
}

/// Cash-flow entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Transaction {
    #[serde(default)]
    pub id: u64,
    pub date: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type")]
    pub kind: FlowKind,
    pub amount: f64,
    #[serde(default = "default_business_type")]
    pub business_type: String,
}

record!(Transaction, "transactions");

fn default_invoice_status() -> String {
    "pending".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Invoice {
    #[serde(default)]
    pub id: u64,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default = "Utc::now")]
    pub issue_date: DateTime<Utc>,
    pub total_amount: f64,
    #[serde(default)]
    pub vat_amount: f64,
    #[serde(default = "default_invoice_status")]
    pub status: String,
    #[serde(default = "default_business_type")]
    pub business_type: String,
}

record!(Invoice, "invoices");

fn default_contract_status() -> String {
    "active".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Contract {
    #[serde(default)]
    pub id: u64,
    pub customer_name: String,
    #[serde(default)]
    pub terms: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_contract_status")]
    pub status: String,
}

record!(Contract, "contracts");

fn default_order_status() -> String {
    "open".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ServiceOrder {
    #[serde(default)]
    pub id: u64,
    pub customer_name: String,
    pub description: String,
    #[serde(default = "default_order_status")]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

record!(ServiceOrder, "service_orders");
