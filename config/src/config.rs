//! # Configuration Structures
//!
//! All sections deserialize with per-field defaults, so a partial TOML file
//! or an empty environment yields the known-good fixture.

use icekit_core::VersionSelection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Query-engine version used when the caller does not pick one.
pub const DEFAULT_TRINO_VERSION: &str = "466";

/// Metadata-store version used when the caller does not pick one.
pub const DEFAULT_POSTGRES_VERSION: &str = "15";

/// Top-level configuration of one fixture.
///
/// ## Usage
/// ```rust,no_run
/// use config::FixtureConfig;
///
/// let config = FixtureConfig::default();
/// assert_eq!(config.versions.trino, "466");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct FixtureConfig {
    #[serde(default)]
    #[validate(nested)]
    pub versions: VersionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    #[validate(nested)]
    pub stabilization: StabilizationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub sql: SqlConfig
}

/// Image tags of the two overridable components.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct VersionConfig {
    #[serde(default = "default_trino_version")]
    #[validate(length(min = 1, max = 128))]
    pub trino: String,

    #[serde(default = "default_postgres_version")]
    #[validate(length(min = 1, max = 128))]
    pub postgres: String
}

fn default_trino_version() -> String {
    DEFAULT_TRINO_VERSION.to_string()
}

fn default_postgres_version() -> String {
    DEFAULT_POSTGRES_VERSION.to_string()
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            trino: default_trino_version(),
            postgres: default_postgres_version()
        }
    }
}

impl VersionConfig {
    pub fn selection(&self) -> VersionSelection {
        VersionSelection::new(self.trino.clone(), self.postgres.clone())
    }
}

/// Readiness bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TimeoutConfig {
    /// Bound on the catalog's log-pattern probe.
    #[serde(default = "default_catalog_readiness_secs")]
    #[validate(range(min = 1, max = 600))]
    pub catalog_readiness_secs: u64,

    /// Runtime default for probes without an explicit bound.
    #[serde(default = "default_startup_secs")]
    #[validate(range(min = 1, max = 1800))]
    pub startup_secs: u64,

    /// Pause between TCP connection attempts of a port probe.
    #[serde(default = "default_port_probe_interval_ms")]
    #[validate(range(min = 10, max = 10_000))]
    pub port_probe_interval_ms: u64
}

fn default_catalog_readiness_secs() -> u64 {
    30
}

fn default_startup_secs() -> u64 {
    120
}

fn default_port_probe_interval_ms() -> u64 {
    250
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            catalog_readiness_secs: default_catalog_readiness_secs(),
            startup_secs: default_startup_secs(),
            port_probe_interval_ms: default_port_probe_interval_ms()
        }
    }
}

impl TimeoutConfig {
    pub fn catalog_readiness(&self) -> Duration {
        Duration::from_secs(self.catalog_readiness_secs)
    }

    pub fn startup(&self) -> Duration {
        Duration::from_secs(self.startup_secs)
    }

    pub fn port_probe_interval(&self) -> Duration {
        Duration::from_millis(self.port_probe_interval_ms)
    }
}

/// How the orchestrator bridges the gap between the query engine logging
/// "server started" and actually accepting queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationMode {
    /// Sleep for `delay_ms`.
    #[default]
    FixedDelay,
    /// Run `SELECT 1` until it succeeds or `probe_attempts` run out.
    ConnectivityProbe
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StabilizationConfig {
    #[serde(default)]
    pub mode: StabilizationMode,

    #[serde(default = "default_delay_ms")]
    #[validate(range(max = 60_000))]
    pub delay_ms: u64,

    #[serde(default = "default_probe_attempts")]
    #[validate(range(min = 1, max = 600))]
    pub probe_attempts: u32,

    #[serde(default = "default_probe_interval_ms")]
    #[validate(range(min = 10, max = 60_000))]
    pub probe_interval_ms: u64
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_probe_attempts() -> u32 {
    30
}

fn default_probe_interval_ms() -> u64 {
    500
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            mode: StabilizationMode::default(),
            delay_ms: default_delay_ms(),
            probe_attempts: default_probe_attempts(),
            probe_interval_ms: default_probe_interval_ms()
        }
    }
}

impl StabilizationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

/// Connection parameters for the SQL handle, minus the resolved endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SqlConfig {
    #[serde(default = "default_sql_user")]
    #[validate(length(min = 1, max = 255))]
    pub user: String,

    #[serde(default = "default_sql_catalog")]
    #[validate(length(min = 1, max = 255))]
    pub catalog: String,

    #[serde(default = "default_sql_schema")]
    #[validate(length(min = 1, max = 255))]
    pub schema: String,

    #[serde(default)]
    pub session_params: BTreeMap<String, String>
}

fn default_sql_user() -> String {
    "PLZ".to_string()
}

fn default_sql_catalog() -> String {
    "iceberg".to_string()
}

fn default_sql_schema() -> String {
    "default".to_string()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            user: default_sql_user(),
            catalog: default_sql_catalog(),
            schema: default_sql_schema(),
            session_params: BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FixtureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.versions.selection(), VersionSelection::new("466", "15"));
        assert_eq!(config.timeouts.catalog_readiness(), Duration::from_secs(30));
        assert_eq!(config.stabilization.mode, StabilizationMode::FixedDelay);
        assert_eq!(config.stabilization.delay(), Duration::from_millis(1000));
        assert_eq!(config.sql.user, "PLZ");
        assert_eq!(config.sql.catalog, "iceberg");
        assert_eq!(config.sql.schema, "default");
    }

    #[test]
    fn test_empty_version_is_rejected() {
        let mut config = FixtureConfig::default();
        config.versions.trino = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_catalog_timeout_is_rejected() {
        let mut config = FixtureConfig::default();
        config.timeouts.catalog_readiness_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: FixtureConfig = toml::from_str(
            r#"
            [versions]
            trino = "419"

            [stabilization]
            mode = "connectivity_probe"
            "#
        )
        .unwrap();
        assert_eq!(config.versions.trino, "419");
        assert_eq!(config.versions.postgres, "15");
        assert_eq!(config.stabilization.mode, StabilizationMode::ConnectivityProbe);
        assert_eq!(config.stabilization.probe_attempts, 30);
        assert_eq!(config.timeouts, TimeoutConfig::default());
    }
}
