//! TechFix ERP server
//!
//! Usage:
//!   cargo run --bin seed_data     # optional: seed a store offline
//!   cargo run --bin techfix_erp   # start the API on TECHFIX_ADDR / PORT

use tokio::net::TcpListener;
use tracing::{info, warn};

use techfix_erp::auth::purge_expired_sessions;
use techfix_erp::config::AppConfig;
use techfix_erp::rest::create_router;
use techfix_erp::seed::{self, SeedSource};
use techfix_erp::storage::Storage;
use techfix_erp::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err.into());
        }
    }
    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(&config.log);

    let storage = Storage::open(&config.db_path)?;
    info!(path = %config.db_path.display(), "store opened");

    let purged = purge_expired_sessions(&storage)?;
    if purged > 0 {
        info!(purged, "expired sessions removed");
    }

    if config.seed_on_start {
        let source = SeedSource::from_dir(config.seed_dir.clone());
        let report = seed::run(&storage, &source, config.bcrypt_cost)?;
        info!(rows = report.total(), "seeding finished");
    }
    if config.jwt_secret == AppConfig::default().jwt_secret {
        warn!("TECHFIX_JWT_SECRET is not set; using the development secret");
    }

    let addr = config.listen_addr;
    let app = create_router(storage.clone(), config);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "TechFix ERP API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    storage.flush()?;
    info!("shut down");
    Ok(())
}
