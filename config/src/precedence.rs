//! # Configuration Precedence
//!
//! 1. Explicit arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::ConfigError;
use crate::config::FixtureConfig;
use crate::file_loader::load_from_toml;
use crate::loader::apply_env;
use icekit_core::VersionSelection;
use std::path::Path;

/// Defaults, then the optional file, then the environment.
pub fn resolve(file: Option<&Path>) -> Result<FixtureConfig, ConfigError> {
    let base = match file {
        Some(path) => load_from_toml(path)?,
        None => FixtureConfig::default()
    };
    apply_env(base)
}

/// Explicit version arguments win over whatever `config` carries.
pub fn merge_versions(
    config: &FixtureConfig,
    trino: Option<&str>,
    postgres: Option<&str>,
) -> VersionSelection {
    let mut selection = config.versions.selection();
    if let Some(version) = trino {
        tracing::debug!(
            "Trino version {} overrides configured {}",
            version,
            selection.query_engine
        );
        selection.query_engine = version.to_string();
    }
    if let Some(version) = postgres {
        tracing::debug!(
            "Postgres version {} overrides configured {}",
            version,
            selection.metadata_store
        );
        selection.metadata_store = version.to_string();
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{
        CATALOG_TIMEOUT_SECS, POSTGRES_VERSION, SQL_USER, STABILIZATION_DELAY_MS,
        STARTUP_TIMEOUT_SECS, TRINO_VERSION,
    };
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for key in [
            TRINO_VERSION,
            POSTGRES_VERSION,
            CATALOG_TIMEOUT_SECS,
            STARTUP_TIMEOUT_SECS,
            STABILIZATION_DELAY_MS,
            SQL_USER,
        ] {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[versions]
trino = "450"
postgres = "14"

[timeouts]
catalog_readiness_secs = 60
"#
        )
        .unwrap();
        unsafe {
            std::env::set_var(TRINO_VERSION, "419");
        }

        let config = resolve(Some(file.path()));
        clear_env();
        let config = config.unwrap();

        assert_eq!(config.versions.trino, "419");
        assert_eq!(config.versions.postgres, "14");
        assert_eq!(config.timeouts.catalog_readiness_secs, 60);
        assert_eq!(config.timeouts.startup_secs, 120);
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[versions]\ntrino = \"450\"").unwrap();

        let config = resolve(Some(file.path())).unwrap();

        assert_eq!(config.versions.trino, "450");
        assert_eq!(config.versions.postgres, "15");
    }

    #[test]
    #[serial]
    fn test_resolve_without_file() {
        clear_env();
        assert_eq!(resolve(None).unwrap(), FixtureConfig::default());

        unsafe {
            std::env::set_var(SQL_USER, "etl");
        }
        let config = resolve(None);
        clear_env();

        assert_eq!(config.unwrap().sql.user, "etl");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        clear_env();
        let result = resolve(Some(Path::new("/nonexistent/icekit.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_explicit_versions_win() {
        let mut config = FixtureConfig::default();
        config.versions.trino = "450".to_string();

        assert_eq!(
            merge_versions(&config, None, None),
            VersionSelection::new("450", "15")
        );
        assert_eq!(
            merge_versions(&config, Some("419"), None),
            VersionSelection::new("419", "15")
        );
        assert_eq!(
            merge_versions(&config, Some("419"), Some("13")),
            VersionSelection::new("419", "13")
        );
    }
}
