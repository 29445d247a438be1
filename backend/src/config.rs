//! # Configuration
//!
//! Runtime settings read from the environment. Every key has a default that
//! is logged when the variable is missing; a value that is present but cannot
//! be parsed aborts startup.

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::Duration;
use tracing::{info, warn};

use crate::domain::point_ledger::{LedgerConfig, RetractionPolicy};

/// Secret used only when `JWT_SECRET` is unset (development)
const DEV_JWT_SECRET: &str = "ministerio-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Allowed CORS origin; any origin when `None`
    pub cors_origin: Option<String>,
    pub upload_dir: PathBuf,
    pub ledger: LedgerConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let point_limit: u32 = try_load("POINT_LIMIT", "4")?;
        let window_hours: i64 = try_load("POINT_WINDOW_HOURS", "4")?;
        let policy_name: String = try_load("RETRACTION_POLICY", "age")?;
        let max_age_secs: i64 = try_load("RETRACTION_MAX_AGE_SECS", "60")?;

        Ok(Self {
            port: try_load("PORT", "3333")?,
            database_url: try_load("DATABASE_URL", "sqlite:ministerio.db")?,
            jwt_secret,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "12")?,
            cors_origin: var("CORS_ORIGIN"),
            upload_dir: PathBuf::from(try_load::<String>("UPLOAD_DIR", "uploads/avatars")?),
            ledger: LedgerConfig {
                award_limit: point_limit,
                window: Duration::hours(window_hours),
                retraction: parse_retraction_policy(&policy_name, max_age_secs)?,
            },
        })
    }
}

/// Map the `RETRACTION_POLICY` setting onto a policy value
pub fn parse_retraction_policy(name: &str, max_age_secs: i64) -> Result<RetractionPolicy> {
    match name.trim().to_lowercase().as_str() {
        "age" | "age-gated" => {
            if max_age_secs <= 0 {
                return Err(anyhow!("RETRACTION_MAX_AGE_SECS must be positive"));
            }
            Ok(RetractionPolicy::AgeGated {
                max_age: Duration::seconds(max_age_secs),
            })
        }
        "recency" | "recency-gated" => Ok(RetractionPolicy::RecencyGated),
        other => Err(anyhow!(
            "Unknown RETRACTION_POLICY '{}': expected 'age' or 'recency'",
            other
        )),
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("Invalid {key} value '{raw}': {e}"))
}
