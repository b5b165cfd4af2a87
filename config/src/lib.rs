//! # Fixture Configuration
//!
//! Tunables for one icekit fixture run.
//!
//! This crate provides:
//! - [`FixtureConfig`] and its sections, with defaults and validation
//! - Environment variable loading (`ICEKIT_*`)
//! - TOML file loading
//! - Precedence: explicit arguments > env > file > defaults
//!
//! Service credentials, bucket and warehouse names are fixed constants of the
//! fixture and deliberately not part of this surface.

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{
    DEFAULT_POSTGRES_VERSION, DEFAULT_TRINO_VERSION, FixtureConfig, SqlConfig, StabilizationConfig,
    StabilizationMode, TimeoutConfig, VersionConfig,
};
pub use file_loader::load_from_toml;
pub use loader::{apply_env, load_from_env};
pub use precedence::{merge_versions, resolve};
pub use validator::Validate;

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse TOML: {reason}")]
    TomlParse { reason: String },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors)
}
