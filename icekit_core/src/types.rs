//! Value types exchanged between the orchestrator and its collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The five services that make up one fixture.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    MetadataStore,
    ObjectStore,
    ObjectStoreBootstrap,
    Catalog,
    QueryEngine
}

impl ServiceKind {
    /// Well-known short name other services use to reach this one.
    pub fn alias(self) -> &'static str {
        match self {
            Self::MetadataStore => "postgres",
            Self::ObjectStore => "minio",
            Self::ObjectStoreBootstrap => "mc",
            Self::Catalog => "iceberg-rest",
            Self::QueryEngine => "trino"
        }
    }
}

/// Image name plus version tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: String
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into()
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Host directory or file bound into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub host_path: PathBuf,
    pub container_path: String
}

/// Condition a runtime waits on before reporting a service as started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// No wait beyond the container having started.
    Started,
    /// The container port accepts TCP connections.
    ListeningPort {
        port: u16,
        timeout: Option<Duration>
    },
    /// A log line containing `pattern` was emitted on stdout or stderr.
    LogPattern {
        pattern: String,
        timeout: Option<Duration>
    }
}

impl Readiness {
    pub fn listening_port(port: u16) -> Self {
        Self::ListeningPort {
            port,
            timeout: None
        }
    }

    pub fn log_pattern(pattern: impl Into<String>) -> Self {
        Self::LogPattern {
            pattern: pattern.into(),
            timeout: None
        }
    }

    pub fn with_timeout(self, bound: Duration) -> Self {
        match self {
            Self::Started => Self::Started,
            Self::ListeningPort { port, .. } => Self::ListeningPort {
                port,
                timeout: Some(bound)
            },
            Self::LogPattern { pattern, .. } => Self::LogPattern {
                pattern,
                timeout: Some(bound)
            }
        }
    }

    /// Explicit bound, if the probe carries one.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Started => None,
            Self::ListeningPort { timeout, .. } | Self::LogPattern { timeout, .. } => *timeout
        }
    }
}

/// Everything a runtime needs to create and start one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub image: ImageRef,
    pub env: BTreeMap<String, String>,
    pub exposed_ports: Vec<u16>,
    pub volumes: Vec<VolumeBinding>,
    pub network: String,
    /// The first alias doubles as the container name.
    pub network_aliases: Vec<String>,
    pub entrypoint: Option<String>,
    pub cmd: Vec<String>,
    pub readiness: Readiness
}

impl ServiceDescriptor {
    pub fn new(kind: ServiceKind, image: ImageRef, network: impl Into<String>) -> Self {
        Self {
            kind,
            image,
            env: BTreeMap::new(),
            exposed_ports: Vec::new(),
            volumes: Vec::new(),
            network: network.into(),
            network_aliases: Vec::new(),
            entrypoint: None,
            cmd: Vec::new(),
            readiness: Readiness::Started
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        self.exposed_ports.push(port);
        self
    }

    pub fn with_volume(
        mut self,
        host_path: impl Into<PathBuf>,
        container_path: impl Into<String>,
    ) -> Self {
        self.volumes.push(VolumeBinding {
            host_path: host_path.into(),
            container_path: container_path.into()
        });
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.network_aliases.push(alias.into());
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        self.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Name the container is created under, falling back to the kind.
    pub fn container_name(&self) -> String {
        self.network_aliases
            .first()
            .cloned()
            .unwrap_or_else(|| format!("{}-{}", self.network, self.kind.alias()))
    }
}

/// A network created for one fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub name: String,
    pub driver: String
}

/// Opaque reference to a container owned by a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub id: String,
    pub kind: ServiceKind,
    pub name: String
}

impl fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool
}

/// Host-side address of a mapped container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Versions of the two independently overridable components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSelection {
    pub query_engine: String,
    pub metadata_store: String
}

impl VersionSelection {
    pub fn new(query_engine: impl Into<String>, metadata_store: impl Into<String>) -> Self {
        Self {
            query_engine: query_engine.into(),
            metadata_store: metadata_store.into()
        }
    }

    pub fn with_query_engine(mut self, version: impl Into<String>) -> Self {
        self.query_engine = version.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String
}

/// Fully drained result of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<serde_json::Value>>
}
