//! Server configuration, read from the environment (after `.env` is loaded).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub seed_on_start: bool,
    /// Directory holding seed JSON files; the bundled data is used otherwise.
    pub seed_dir: Option<PathBuf>,
    /// Products with less stock than this count as stock alerts.
    pub stock_alert_threshold: i64,
    pub finance: FinanceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinanceConfig {
    /// Percent, applied to VAT-inclusive inbound cash.
    pub default_vat_rate: f64,
    /// Fraction of positive EBITDA.
    pub income_tax_rate: f64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
    pub dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db_path: PathBuf::from("techfix_data"),
            jwt_secret: "development-secret-change-in-production".to_string(),
            session_ttl_secs: 8 * 60 * 60,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            seed_on_start: true,
            seed_dir: None,
            stock_alert_threshold: 10,
            finance: FinanceConfig::default(),
            log: LogConfig {
                filter: "techfix_erp=info,tower_http=info".to_string(),
                json: false,
                dir: None,
            },
        }
    }
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            default_vat_rate: crate::models::DEFAULT_VAT_RATE,
            income_tax_rate: 0.20,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut listen_addr = parsed(&lookup, "TECHFIX_ADDR", defaults.listen_addr)?;
        if let Some(port) = lookup("PORT") {
            listen_addr.set_port(parse("PORT", &port)?);
        }

        let bcrypt_cost = parsed(&lookup, "TECHFIX_BCRYPT_COST", defaults.bcrypt_cost)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "TECHFIX_BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".to_string(),
            });
        }

        let session_ttl_secs = parsed(&lookup, "TECHFIX_SESSION_TTL_SECS", defaults.session_ttl_secs)?;
        if session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "TECHFIX_SESSION_TTL_SECS",
                value: session_ttl_secs.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            listen_addr,
            db_path: lookup("TECHFIX_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            jwt_secret: lookup("TECHFIX_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            session_ttl_secs,
            bcrypt_cost,
            seed_on_start: parsed(&lookup, "TECHFIX_SEED", defaults.seed_on_start)?,
            seed_dir: lookup("TECHFIX_SEED_DIR").map(PathBuf::from),
            stock_alert_threshold: parsed(
                &lookup,
                "TECHFIX_STOCK_ALERT_THRESHOLD",
                defaults.stock_alert_threshold,
            )?,
            finance: FinanceConfig {
                default_vat_rate: parsed(
                    &lookup,
                    "TECHFIX_DEFAULT_VAT_RATE",
                    defaults.finance.default_vat_rate,
                )?,
                income_tax_rate: parsed(
                    &lookup,
                    "TECHFIX_INCOME_TAX_RATE",
                    defaults.finance.income_tax_rate,
                )?,
            },
            log: LogConfig {
                filter: lookup("RUST_LOG").unwrap_or(defaults.log.filter),
                json: parsed(&lookup, "TECHFIX_LOG_JSON", defaults.log.json)?,
                dir: lookup("TECHFIX_LOG_DIR").map(PathBuf::from),
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            bcrypt_cost: 4,
            seed_on_start: false,
            ..Self::default()
        }
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}
