//! Seed script for the TechFix ERP store
//!
//! Loads the bundled reference data (or the JSON files in --dir) into every
//! empty table. With --reseed-users, all accounts and sessions are replaced by
//! the seed users instead.
//! Run: cargo run --bin seed_data -- --db techfix_data

use clap::Parser;
use std::path::PathBuf;

use techfix_erp::config::AppConfig;
use techfix_erp::seed::{self, SeedSource};
use techfix_erp::storage::Storage;
use techfix_erp::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "seed_data", about = "Seed the TechFix ERP store")]
struct Args {
    /// Store path; defaults to TECHFIX_DB_PATH
    #[arg(long)]
    db: Option<PathBuf>,
    /// Directory of seed JSON files; defaults to the bundled data
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Drop all users and sessions and load the seed users again
    #[arg(long)]
    reseed_users: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(&config.log);

    let db_path = args.db.unwrap_or_else(|| config.db_path.clone());
    let storage = Storage::open(&db_path)?;
    let source = SeedSource::from_dir(args.dir.or(config.seed_dir));

    if args.reseed_users {
        let inserted = seed::reseed_users(&storage, &source, config.bcrypt_cost)?;
        println!("Users re-seeded: {inserted}");
    } else {
        let report = seed::run(&storage, &source, config.bcrypt_cost)?;
        for (table, rows) in &report.inserted {
            println!("{table:<24} {rows}");
        }
        println!("Seeded {} rows into {}", report.total(), db_path.display());
    }

    storage.flush()?;
    Ok(())
}
