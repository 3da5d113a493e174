//! TechFix ERP: small-business back office over an embedded Sled store.
//!
//! Inventory, point of sale, invoicing, fleet logistics, cash flow and user
//! management, served as a REST/JSON API by [`rest::create_router`].

pub mod attributes;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod reports;
// REST API module: Axum handlers under /api, guarded by the session middleware
pub mod rest;
pub mod routing;
pub mod seed;
pub mod storage;
pub mod telemetry;
