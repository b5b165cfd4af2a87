//! # Configuration File Loading

use crate::ConfigError;
use crate::config::FixtureConfig;
use std::path::Path;
use validator::Validate;

/// Load and validate a [`FixtureConfig`] from a TOML file.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_toml;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("icekit.toml"))?;
///     println!("Trino version: {}", config.versions.trino);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<FixtureConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|_e| ConfigError::FileNotFound {
        path: path.display().to_string()
    })?;

    let config: FixtureConfig = toml::from_str(&contents).map_err(|e| ConfigError::TomlParse {
        reason: e.to_string()
    })?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[versions]
postgres = "13"

[timeouts]
catalog_readiness_secs = 60
"#
        )
        .unwrap();

        let config = load_from_toml(file.path()).unwrap();
        assert_eq!(config.versions.trino, "466");
        assert_eq!(config.versions.postgres, "13");
        assert_eq!(config.timeouts.catalog_readiness_secs, 60);
    }

    #[test]
    fn test_missing_file() {
        let result = load_from_toml(Path::new("/nonexistent/icekit.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[versions\ntrino = ").unwrap();

        let result = load_from_toml(file.path());
        assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
    }
}
