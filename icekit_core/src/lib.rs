//! # icekit core
//!
//! Shared vocabulary for the icekit fixture:
//! - [`types`]: service kinds, descriptors, handles and version selection
//! - [`traits`]: the container runtime and SQL client seams
//! - [`dsn`]: the query-engine connection string

pub mod dsn;
pub mod traits;
pub mod types;

pub use dsn::TrinoConf;
pub use traits::{ContainerRuntime, SqlClient, SqlConnector};
pub use types::{
    Column, Endpoint, ImageRef, NetworkHandle, QueryResult, Readiness, ServiceDescriptor,
    ServiceHandle, ServiceKind, ServiceStatus, VersionSelection, VolumeBinding,
};
