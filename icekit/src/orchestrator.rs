//! Fixture setup pipeline.
//!
//! Services start strictly one after another, each waiting on its readiness
//! probe before the next is created:
//!
//! ```text
//! network -> metadata-store -> object-store -> bootstrap -> catalog -> query-engine -> SQL client
//! ```
//!
//! A failed step aborts the pipeline. Nothing is rolled back; every service
//! created so far is handed back in the error's [`PartialSetup`].

use crate::descriptors::{self, TRINO_PORT};
use config::{ConfigError, FixtureConfig, StabilizationMode, Validate};
use errors::FixtureError;
use icekit_core::{
    ContainerRuntime, Endpoint, NetworkHandle, ServiceDescriptor, ServiceHandle, ServiceKind,
    SqlClient, SqlConnector, TrinoConf, VersionSelection,
};
use std::future::Future;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const NETWORK_DRIVER: &str = "bridge";

/// Pipeline stage, reported with every setup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SetupStep {
    #[strum(to_string = "creating the network")]
    CreateNetwork,
    #[strum(to_string = "starting the metadata store")]
    StartMetadataStore,
    #[strum(to_string = "starting the object store")]
    StartObjectStore,
    #[strum(to_string = "starting the object-store bootstrap")]
    StartObjectStoreBootstrap,
    #[strum(to_string = "starting the catalog")]
    StartCatalog,
    #[strum(to_string = "starting the query engine")]
    StartQueryEngine,
    #[strum(to_string = "resolving the query-engine endpoint")]
    ResolveEndpoint,
    #[strum(to_string = "opening the SQL client")]
    OpenClient,
    #[strum(to_string = "waiting for the query engine to accept queries")]
    StabilizeQueryEngine
}

/// Resources created before a setup failure. Never wrapped in a [`Fixture`].
#[derive(Debug, Default)]
pub struct PartialSetup {
    pub network: Option<NetworkHandle>,
    /// In creation order.
    pub services: Vec<ServiceHandle>,
    scratch: Vec<TempDir>
}

#[derive(Debug, thiserror::Error)]
#[error("Fixture setup failed while {step}: {source}")]
pub struct SetupError {
    pub step: SetupStep,
    #[source]
    pub source: FixtureError,
    pub partial: PartialSetup
}

/// Every service of a successful setup plus the open SQL handle.
#[derive(Debug)]
pub struct Fixture {
    network: NetworkHandle,
    metadata_store: ServiceHandle,
    object_store: ServiceHandle,
    object_store_bootstrap: ServiceHandle,
    catalog: ServiceHandle,
    query_engine: ServiceHandle,
    endpoint: Endpoint,
    dsn: String,
    sql: Arc<dyn SqlClient>,
    #[allow(dead_code)]
    scratch: Vec<TempDir>
}

impl Fixture {
    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    pub fn metadata_store(&self) -> &ServiceHandle {
        &self.metadata_store
    }

    pub fn object_store(&self) -> &ServiceHandle {
        &self.object_store
    }

    pub fn object_store_bootstrap(&self) -> &ServiceHandle {
        &self.object_store_bootstrap
    }

    pub fn catalog(&self) -> &ServiceHandle {
        &self.catalog
    }

    pub fn query_engine(&self) -> &ServiceHandle {
        &self.query_engine
    }

    pub fn service(&self, kind: ServiceKind) -> &ServiceHandle {
        match kind {
            ServiceKind::MetadataStore => &self.metadata_store,
            ServiceKind::ObjectStore => &self.object_store,
            ServiceKind::ObjectStoreBootstrap => &self.object_store_bootstrap,
            ServiceKind::Catalog => &self.catalog,
            ServiceKind::QueryEngine => &self.query_engine
        }
    }

    /// Host-side address of the query engine.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn sql(&self) -> &Arc<dyn SqlClient> {
        &self.sql
    }
}

type StepResult<T> = Result<T, (SetupStep, FixtureError)>;

async fn cancellable<T>(
    cancel: &CancellationToken,
    step: SetupStep,
    work: impl Future<Output = Result<T, FixtureError>>,
) -> StepResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err((step, FixtureError::Cancelled { step: step.to_string() })),
        result = work => result.map_err(|e| (step, e)),
    }
}

pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    connector: Arc<dyn SqlConnector>,
    config: FixtureConfig
}

impl Orchestrator {
    /// Rejects a `config` that fails validation.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        connector: Arc<dyn SqlConnector>,
        config: FixtureConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(runtime, connector, config))
    }

    /// `config` must already have passed validation.
    pub(crate) fn from_valid_config(
        runtime: Arc<dyn ContainerRuntime>,
        connector: Arc<dyn SqlConnector>,
        config: FixtureConfig,
    ) -> Self {
        Self {
            runtime,
            connector,
            config
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Runs the whole pipeline. Cancelling `cancel` aborts the current wait;
    /// services already started keep running.
    pub async fn setup(
        &self,
        cancel: &CancellationToken,
        versions: &VersionSelection,
    ) -> Result<Fixture, SetupError> {
        tracing::info!(
            "Setting up fixture with trino {} and postgres {}",
            versions.query_engine,
            versions.metadata_store
        );

        let mut partial = PartialSetup::default();
        match self.run(cancel, versions, &mut partial).await {
            Ok(fixture) => {
                tracing::info!(
                    "Fixture ready on network {}, query engine at {}",
                    fixture.network.name,
                    fixture.endpoint
                );
                Ok(fixture)
            }
            Err((step, source)) => {
                tracing::error!(
                    "Fixture setup failed while {} ({} service(s) left running): {}",
                    step,
                    partial.services.len(),
                    source
                );
                Err(SetupError {
                    step,
                    source,
                    partial
                })
            }
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        versions: &VersionSelection,
        partial: &mut PartialSetup,
    ) -> StepResult<Fixture> {
        let network = cancellable(cancel, SetupStep::CreateNetwork, async {
            self.runtime
                .create_network(NETWORK_DRIVER)
                .await
                .map_err(|e| FixtureError::NetworkCreationFailed {
                    reason: e.to_string()
                })
        })
        .await?;
        tracing::info!("Created {} network {}", network.driver, network.name);
        partial.network = Some(network.clone());
        let net = network.name.as_str();

        let data_dir = descriptors::scratch_dir(ServiceKind::MetadataStore)
            .map_err(|e| (SetupStep::StartMetadataStore, e))?;
        let descriptor = descriptors::metadata_store(net, &versions.metadata_store, data_dir.path());
        partial.scratch.push(data_dir);
        let metadata_store = self
            .launch(cancel, SetupStep::StartMetadataStore, descriptor, partial)
            .await?;
        self.verify_running(cancel, SetupStep::StartMetadataStore, &metadata_store)
            .await?;

        let data_dir = descriptors::scratch_dir(ServiceKind::ObjectStore)
            .map_err(|e| (SetupStep::StartObjectStore, e))?;
        let descriptor = descriptors::object_store(net, data_dir.path());
        partial.scratch.push(data_dir);
        let object_store = self
            .launch(cancel, SetupStep::StartObjectStore, descriptor, partial)
            .await?;

        let object_store_bootstrap = self
            .launch(
                cancel,
                SetupStep::StartObjectStoreBootstrap,
                descriptors::object_store_bootstrap(net),
                partial,
            )
            .await?;

        let catalog = self
            .launch(
                cancel,
                SetupStep::StartCatalog,
                descriptors::catalog(net, self.config.timeouts.catalog_readiness()),
                partial,
            )
            .await?;

        let conf_dir = descriptors::scratch_dir(ServiceKind::QueryEngine)
            .map_err(|e| (SetupStep::StartQueryEngine, e))?;
        let properties = descriptors::catalog_properties(net, &versions.query_engine);
        let catalog_file = descriptors::write_catalog_properties(conf_dir.path(), &properties)
            .map_err(|e| (SetupStep::StartQueryEngine, e))?;
        partial.scratch.push(conf_dir);
        let query_engine = self
            .launch(
                cancel,
                SetupStep::StartQueryEngine,
                descriptors::query_engine(net, &versions.query_engine, &catalog_file),
                partial,
            )
            .await?;

        let stabilization = &self.config.stabilization;
        if stabilization.mode == StabilizationMode::FixedDelay && stabilization.delay_ms > 0 {
            tracing::debug!(
                "Waiting {:?} for the query engine to settle",
                stabilization.delay()
            );
            cancellable(cancel, SetupStep::StartQueryEngine, async {
                tokio::time::sleep(stabilization.delay()).await;
                Ok(())
            })
            .await?;
        }

        let endpoint = cancellable(cancel, SetupStep::ResolveEndpoint, async {
            let unresolved = |e: errors::RuntimeError| FixtureError::ServiceStartFailed {
                service: ServiceKind::QueryEngine.to_string(),
                reason: format!("endpoint unavailable: {}", e)
            };
            let host = self.runtime.host(&query_engine).await.map_err(unresolved)?;
            let port = self
                .runtime
                .mapped_port(&query_engine, TRINO_PORT)
                .await
                .map_err(unresolved)?;
            Ok(Endpoint { host, port })
        })
        .await?;

        let sql_config = &self.config.sql;
        let dsn = TrinoConf {
            user: sql_config.user.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
            catalog: sql_config.catalog.clone(),
            schema: sql_config.schema.clone(),
            session_params: sql_config.session_params.clone()
        }
        .connection_string();
        let sql = self.connector.open(&dsn).map_err(|e| {
            (
                SetupStep::OpenClient,
                FixtureError::ClientOpenFailed {
                    dsn: dsn.clone(),
                    reason: e.to_string()
                },
            )
        })?;
        tracing::info!("Opened SQL client for {}", dsn);

        if stabilization.mode == StabilizationMode::ConnectivityProbe {
            if let Err(failure) = self.probe_query_engine(cancel, sql.as_ref()).await {
                if let Err(e) = sql.close().await {
                    tracing::warn!("Closing SQL client after failed probe: {}", e);
                }
                return Err(failure);
            }
        }

        Ok(Fixture {
            network,
            metadata_store,
            object_store,
            object_store_bootstrap,
            catalog,
            query_engine,
            endpoint,
            dsn,
            sql,
            scratch: std::mem::take(&mut partial.scratch)
        })
    }

    /// Creates one service and waits for its readiness probe. Probes with an
    /// explicit bound are started separately so that image pulls do not count
    /// against the bound.
    async fn launch(
        &self,
        cancel: &CancellationToken,
        step: SetupStep,
        descriptor: ServiceDescriptor,
        partial: &mut PartialSetup,
    ) -> StepResult<ServiceHandle> {
        let kind = descriptor.kind;
        let service = kind.to_string();
        let bound = descriptor.readiness.timeout();
        tracing::info!("Starting {} from {}", kind, descriptor.image);

        let handle = cancellable(cancel, step, async {
            self.runtime
                .create_container(descriptor, bound.is_none())
                .await
                .map_err(|e| FixtureError::from_start(&service, e))
        })
        .await?;
        partial.services.push(handle.clone());

        if let Some(bound) = bound {
            cancellable(cancel, step, async {
                match tokio::time::timeout(bound, self.runtime.start(&handle)).await {
                    Ok(started) => started.map_err(|e| FixtureError::from_start(&service, e)),
                    Err(_elapsed) => Err(FixtureError::ReadinessTimeout {
                        service: service.clone(),
                        timeout_ms: bound.as_millis() as u64
                    })
                }
            })
            .await?;
        }

        tracing::info!("{} is ready", handle);
        Ok(handle)
    }

    async fn verify_running(
        &self,
        cancel: &CancellationToken,
        step: SetupStep,
        handle: &ServiceHandle,
    ) -> StepResult<()> {
        let unhealthy = |reason: String| FixtureError::DependencyUnhealthy {
            service: handle.kind.to_string(),
            reason
        };
        let status = cancellable(cancel, step, async {
            self.runtime
                .status(handle)
                .await
                .map_err(|e| unhealthy(e.to_string()))
        })
        .await?;

        if !status.running {
            return Err((step, unhealthy("status query reports not running".to_string())));
        }
        Ok(())
    }

    async fn probe_query_engine(
        &self,
        cancel: &CancellationToken,
        sql: &dyn SqlClient,
    ) -> StepResult<()> {
        let stabilization = &self.config.stabilization;
        cancellable(cancel, SetupStep::StabilizeQueryEngine, async {
            for attempt in 1..=stabilization.probe_attempts {
                match sql.query("SELECT 1").await {
                    Ok(_) => {
                        tracing::debug!("Query engine answered after {} attempt(s)", attempt);
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!("Query engine probe attempt {} failed: {}", attempt, e);
                    }
                }
                if attempt < stabilization.probe_attempts {
                    tokio::time::sleep(stabilization.probe_interval()).await;
                }
            }
            Err(FixtureError::ReadinessTimeout {
                service: ServiceKind::QueryEngine.to_string(),
                timeout_ms: u64::from(stabilization.probe_attempts) * stabilization.probe_interval_ms
            })
        })
        .await
    }
}
