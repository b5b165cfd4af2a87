//! Collaborator seams for the fixture orchestrator.

use crate::types::{NetworkHandle, QueryResult, ServiceDescriptor, ServiceHandle, ServiceStatus};
use async_trait::async_trait;
use errors::{RuntimeError, SqlClientError};
use std::sync::Arc;

/// Container runtime the orchestrator drives.
///
/// Implementations own the containers they create; handles are plain
/// references into that ownership. Readiness probes attached to a descriptor
/// are awaited by `create_container` (when `auto_start` is set) or by
/// `start`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_network(&self, driver: &str) -> Result<NetworkHandle, RuntimeError>;

    async fn create_container(
        &self,
        descriptor: ServiceDescriptor,
        auto_start: bool,
    ) -> Result<ServiceHandle, RuntimeError>;

    async fn start(&self, service: &ServiceHandle) -> Result<(), RuntimeError>;

    async fn status(&self, service: &ServiceHandle) -> Result<ServiceStatus, RuntimeError>;

    async fn host(&self, service: &ServiceHandle) -> Result<String, RuntimeError>;

    async fn mapped_port(
        &self,
        service: &ServiceHandle,
        container_port: u16,
    ) -> Result<u16, RuntimeError>;

    /// Stops and removes the container. A second call reports
    /// [`RuntimeError::AlreadyTerminated`].
    async fn terminate(&self, service: &ServiceHandle) -> Result<(), RuntimeError>;
}

/// Opens SQL client handles from a DSN.
pub trait SqlConnector: Send + Sync {
    /// Builds a client without touching the network.
    fn open(&self, dsn: &str) -> Result<Arc<dyn SqlClient>, SqlClientError>;
}

#[async_trait]
pub trait SqlClient: Send + Sync + std::fmt::Debug {
    async fn query(&self, sql: &str) -> Result<QueryResult, SqlClientError>;

    /// Closes the handle. A second call reports
    /// [`SqlClientError::AlreadyClosed`].
    async fn close(&self) -> Result<(), SqlClientError>;

    fn is_closed(&self) -> bool;
}
