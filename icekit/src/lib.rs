//! # icekit
//!
//! Disposable Iceberg stack for integration tests: PostgreSQL as the catalog
//! metadata store, MinIO as the object store, an Iceberg REST catalog and
//! Trino as the SQL engine, all on one private container network.
//!
//! [`IcebergRunner::setup`] starts the services in dependency order and hands
//! back a [`Fixture`] with an open SQL client. [`IcebergRunner::teardown`]
//! removes everything again and is safe to call more than once.
//!
//! The container runtime and the SQL driver sit behind the
//! [`ContainerRuntime`] and [`SqlConnector`] traits from `icekit_core`, so
//! the pipeline can be driven without Docker.

pub mod descriptors;
pub mod orchestrator;
pub mod runner;
pub mod runtime;
pub mod teardown;
pub mod trino;

pub use config::{ConfigError, FixtureConfig};
pub use errors::{FixtureError, RuntimeError, SqlClientError, TeardownError};
pub use icekit_core::{
    ContainerRuntime, Endpoint, QueryResult, ServiceHandle, ServiceKind, SqlClient, SqlConnector,
    TrinoConf, VersionSelection,
};
pub use orchestrator::{Fixture, Orchestrator, PartialSetup, SetupError, SetupStep};
pub use runner::IcebergRunner;
pub use runtime::DockerRuntime;
pub use trino::{TrinoClient, TrinoConnector};
