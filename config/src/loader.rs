//! # Environment Variable Loader
//!
//! Overrides configuration from `ICEKIT_*` environment variables.
//!
//! ## Environment Variables
//! - `ICEKIT_TRINO_VERSION`: query-engine image tag (default: "466")
//! - `ICEKIT_POSTGRES_VERSION`: metadata-store image tag (default: "15")
//! - `ICEKIT_CATALOG_TIMEOUT_SECS`: catalog readiness bound (default: 30)
//! - `ICEKIT_STARTUP_TIMEOUT_SECS`: bound for probes without one (default: 120)
//! - `ICEKIT_STABILIZATION_DELAY_MS`: post-start delay of the query engine
//!   (default: 1000)
//! - `ICEKIT_SQL_USER`: user in the query-engine DSN (default: "PLZ")

use crate::ConfigError;
use crate::config::FixtureConfig;
use std::env;
use std::str::FromStr;
use validator::Validate;

pub const TRINO_VERSION: &str = "ICEKIT_TRINO_VERSION";
pub const POSTGRES_VERSION: &str = "ICEKIT_POSTGRES_VERSION";
pub const CATALOG_TIMEOUT_SECS: &str = "ICEKIT_CATALOG_TIMEOUT_SECS";
pub const STARTUP_TIMEOUT_SECS: &str = "ICEKIT_STARTUP_TIMEOUT_SECS";
pub const STABILIZATION_DELAY_MS: &str = "ICEKIT_STABILIZATION_DELAY_MS";
pub const SQL_USER: &str = "ICEKIT_SQL_USER";

/// Defaults overridden by the environment.
pub fn load_from_env() -> Result<FixtureConfig, ConfigError> {
    apply_env(FixtureConfig::default())
}

/// Applies every set `ICEKIT_*` variable on top of `config` and validates the
/// result.
pub fn apply_env(mut config: FixtureConfig) -> Result<FixtureConfig, ConfigError> {
    if let Some(version) = string_env(TRINO_VERSION) {
        config.versions.trino = version;
    }
    if let Some(version) = string_env(POSTGRES_VERSION) {
        config.versions.postgres = version;
    }
    if let Some(secs) = parse_env(CATALOG_TIMEOUT_SECS)? {
        config.timeouts.catalog_readiness_secs = secs;
    }
    if let Some(secs) = parse_env(STARTUP_TIMEOUT_SECS)? {
        config.timeouts.startup_secs = secs;
    }
    if let Some(millis) = parse_env(STABILIZATION_DELAY_MS)? {
        config.stabilization.delay_ms = millis;
    }
    if let Some(user) = string_env(SQL_USER) {
        config.sql.user = user;
    }

    config.validate()?;
    Ok(config)
}

fn string_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match string_env(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw
            }
        })
    }
}
