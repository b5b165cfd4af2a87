//! Public entry points.

use crate::orchestrator::{Fixture, Orchestrator, PartialSetup, SetupError};
use crate::runtime::DockerRuntime;
use crate::teardown;
use crate::trino::TrinoConnector;
use config::{ConfigError, FixtureConfig};
use errors::TeardownError;
use icekit_core::{ContainerRuntime, SqlConnector};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sets up and tears down Iceberg fixtures.
///
/// ```no_run
/// # async fn demo() -> anyhow::Result<()> {
/// use icekit::IcebergRunner;
/// use tokio_util::sync::CancellationToken;
///
/// let runner = IcebergRunner::from_env()?;
/// let fixture = runner.setup(&CancellationToken::new()).await?;
/// fixture.sql().query("SHOW SCHEMAS").await?;
/// runner.teardown(&fixture).await?;
/// # Ok(())
/// # }
/// ```
pub struct IcebergRunner {
    orchestrator: Orchestrator
}

impl Default for IcebergRunner {
    fn default() -> Self {
        let config = FixtureConfig::default();
        let runtime = Arc::new(DockerRuntime::from_config(&config.timeouts));
        Self {
            orchestrator: Orchestrator::from_valid_config(
                runtime,
                Arc::new(TrinoConnector::new()),
                config,
            )
        }
    }
}

impl IcebergRunner {
    /// Docker-backed runner with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: FixtureConfig) -> Result<Self, ConfigError> {
        let runtime = Arc::new(DockerRuntime::from_config(&config.timeouts));
        Self::with_collaborators(runtime, Arc::new(TrinoConnector::new()), config)
    }

    /// Defaults overlaid with `ICEKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(config::load_from_env()?)
    }

    /// Defaults, then `path`, then the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_config(config::resolve(Some(path))?)
    }

    /// Fails when `config` does not pass validation.
    pub fn with_collaborators(
        runtime: Arc<dyn ContainerRuntime>,
        connector: Arc<dyn SqlConnector>,
        config: FixtureConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            orchestrator: Orchestrator::new(runtime, connector, config)?
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        self.orchestrator.config()
    }

    /// Configured versions (Trino 466 and PostgreSQL 15 unless overridden).
    pub async fn setup(&self, cancel: &CancellationToken) -> Result<Fixture, SetupError> {
        self.setup_with_custom_versions(cancel, None, None).await
    }

    pub async fn setup_with_custom_trino_version(
        &self,
        cancel: &CancellationToken,
        trino_version: &str,
    ) -> Result<Fixture, SetupError> {
        self.setup_with_custom_versions(cancel, Some(trino_version), None)
            .await
    }

    /// `None` keeps the configured version for that service.
    pub async fn setup_with_custom_versions(
        &self,
        cancel: &CancellationToken,
        trino_version: Option<&str>,
        postgres_version: Option<&str>,
    ) -> Result<Fixture, SetupError> {
        let versions =
            config::merge_versions(self.orchestrator.config(), trino_version, postgres_version);
        self.orchestrator.setup(cancel, &versions).await
    }

    pub async fn teardown(&self, fixture: &Fixture) -> Result<(), TeardownError> {
        teardown::teardown(self.orchestrator.runtime().as_ref(), fixture).await
    }

    /// Removes services a failed setup left running.
    pub async fn cleanup_partial(&self, partial: &PartialSetup) -> Result<(), TeardownError> {
        teardown::cleanup_partial(self.orchestrator.runtime().as_ref(), partial).await
    }
}
