//! Application configuration loaded from environment variables.

use std::str::FromStr;

use rust_decimal::Decimal;
use stratafi_core::{Policy, ReleaseFrequency};

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the lifecycle sweeper runs
    pub sweep_interval_secs: u64,
    /// Treasury wallet recorded on new campaigns
    pub treasury_wallet: String,
    /// Fundraising and vesting rules
    pub policy: Policy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./stratafi.db".to_string()),
            api_port: parse_or("API_PORT", 3001)?,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", 60)?,
            treasury_wallet: env_var("TREASURY_WALLET").map_err(|_| {
                ApiError::Config("TREASURY_WALLET environment variable is required".to_string())
            })?,
            policy: policy_from_env()?,
        })
    }
}

/// Start from [`Policy::default`] and apply any overrides present in the
/// environment.
fn policy_from_env() -> Result<Policy> {
    let defaults = Policy::default();
    let policy = Policy {
        minimum_raise_ratio: parse_or("MIN_RAISE_RATIO", defaults.minimum_raise_ratio)?,
        tradeable_share: parse_or("TRADEABLE_SHARE", defaults.tradeable_share)?,
        locked_share: parse_or("LOCKED_SHARE", defaults.locked_share)?,
        cliff_months: parse_or("CLIFF_MONTHS", defaults.cliff_months)?,
        vesting_months: parse_or("VESTING_MONTHS", defaults.vesting_months)?,
        release_frequency: match env_var("RELEASE_FREQUENCY") {
            Ok(raw) => ReleaseFrequency::from_str(&raw)
                .map_err(|_| ApiError::Config("Invalid RELEASE_FREQUENCY".to_string()))?,
            Err(_) => defaults.release_frequency,
        },
        release_percentage: parse_or::<Decimal>("RELEASE_PERCENTAGE", defaults.release_percentage)?,
        min_period_days: parse_or("MIN_PERIOD_DAYS", defaults.min_period_days)?,
        max_period_days: parse_or("MAX_PERIOD_DAYS", defaults.max_period_days)?,
    };
    policy
        .validate()
        .map_err(|e| ApiError::Config(e.to_string()))?;
    Ok(policy)
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::Config(format!("Missing env var: {key}")))
}
