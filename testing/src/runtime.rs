//! In-memory container runtime.

use async_trait::async_trait;
use dashmap::DashMap;
use errors::RuntimeError;
use icekit_core::{
    ContainerRuntime, NetworkHandle, ServiceDescriptor, ServiceHandle, ServiceKind, ServiceStatus,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

pub const FAKE_HOST: &str = "127.0.0.1";
pub const FAKE_MAPPED_PORT: u16 = 51234;

/// One observed runtime interaction, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    CreateNetwork { driver: String },
    Create { kind: ServiceKind, auto_start: bool },
    Start { kind: ServiceKind },
    /// Readiness wait completed.
    Ready { kind: ServiceKind },
    Status { kind: ServiceKind },
    Host { kind: ServiceKind },
    MappedPort { kind: ServiceKind, port: u16 },
    Terminate { kind: ServiceKind }
}

#[derive(Debug)]
struct FakeService {
    kind: ServiceKind,
    started: bool,
    terminated: bool
}

#[derive(Debug, Default)]
struct Script {
    fail_network: bool,
    fail_create: HashSet<ServiceKind>,
    fail_start: HashSet<ServiceKind>,
    not_running: HashSet<ServiceKind>,
    hang_readiness: HashSet<ServiceKind>,
    fail_terminate: HashSet<ServiceKind>
}

/// Records calls and answers from a script. Every service becomes ready
/// immediately unless told otherwise.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    script: Script,
    calls: Mutex<Vec<RuntimeCall>>,
    descriptors: Mutex<Vec<ServiceDescriptor>>,
    services: DashMap<String, FakeService>,
    next_id: AtomicU32
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_network(mut self) -> Self {
        self.script.fail_network = true;
        self
    }

    pub fn fail_create(mut self, kind: ServiceKind) -> Self {
        self.script.fail_create.insert(kind);
        self
    }

    /// The readiness wait for `kind` reports failure.
    pub fn fail_start(mut self, kind: ServiceKind) -> Self {
        self.script.fail_start.insert(kind);
        self
    }

    /// Status queries for `kind` report a stopped container.
    pub fn not_running(mut self, kind: ServiceKind) -> Self {
        self.script.not_running.insert(kind);
        self
    }

    /// The readiness wait for `kind` never completes.
    pub fn hang_readiness(mut self, kind: ServiceKind) -> Self {
        self.script.hang_readiness.insert(kind);
        self
    }

    pub fn fail_terminate(mut self, kind: ServiceKind) -> Self {
        self.script.fail_terminate.insert(kind);
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().clone()
    }

    /// Kinds that finished their readiness wait, in order.
    pub fn ready_order(&self) -> Vec<ServiceKind> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Ready { kind } => Some(kind),
                _ => None
            })
            .collect()
    }

    pub fn terminate_order(&self) -> Vec<ServiceKind> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RuntimeCall::Terminate { kind } => Some(kind),
                _ => None
            })
            .collect()
    }

    pub fn descriptor(&self, kind: ServiceKind) -> Option<ServiceDescriptor> {
        self.descriptors
            .lock()
            .iter()
            .find(|descriptor| descriptor.kind == kind)
            .cloned()
    }

    pub fn is_terminated(&self, kind: ServiceKind) -> bool {
        self.services
            .iter()
            .any(|entry| entry.kind == kind && entry.terminated)
    }

    /// Services created and not yet terminated.
    pub fn live_services(&self) -> usize {
        self.services.iter().filter(|entry| !entry.terminated).count()
    }

    fn record(&self, call: RuntimeCall) {
        tracing::trace!("Fake runtime call: {:?}", call);
        self.calls.lock().push(call);
    }

    fn kind_of(&self, service: &ServiceHandle) -> Result<ServiceKind, RuntimeError> {
        self.services
            .get(&service.id)
            .map(|entry| entry.kind)
            .ok_or_else(|| RuntimeError::UnknownService {
                service: service.name.clone()
            })
    }

    async fn await_ready(&self, service: &ServiceHandle) -> Result<(), RuntimeError> {
        let kind = service.kind;
        if self.script.hang_readiness.contains(&kind) {
            std::future::pending::<()>().await;
        }
        if self.script.fail_start.contains(&kind) {
            return Err(RuntimeError::operation(
                "start",
                &service.name,
                "scripted readiness failure"
            ));
        }
        if let Some(mut entry) = self.services.get_mut(&service.id) {
            entry.started = true;
        }
        self.record(RuntimeCall::Ready { kind });
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_network(&self, driver: &str) -> Result<NetworkHandle, RuntimeError> {
        self.record(RuntimeCall::CreateNetwork {
            driver: driver.to_string()
        });
        if self.script.fail_network {
            return Err(RuntimeError::UnsupportedNetworkDriver {
                driver: driver.to_string()
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(NetworkHandle {
            name: format!("icekit-fake{:07}", id),
            driver: driver.to_string()
        })
    }

    async fn create_container(
        &self,
        descriptor: ServiceDescriptor,
        auto_start: bool,
    ) -> Result<ServiceHandle, RuntimeError> {
        let kind = descriptor.kind;
        self.record(RuntimeCall::Create { kind, auto_start });
        let name = descriptor.container_name();
        self.descriptors.lock().push(descriptor);

        if self.script.fail_create.contains(&kind) {
            return Err(RuntimeError::operation("create", &name, "scripted create failure"));
        }

        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.services.insert(
            id.clone(),
            FakeService {
                kind,
                started: false,
                terminated: false
            },
        );
        let handle = ServiceHandle { id, kind, name };

        if auto_start {
            self.await_ready(&handle).await?;
        }
        Ok(handle)
    }

    async fn start(&self, service: &ServiceHandle) -> Result<(), RuntimeError> {
        let kind = self.kind_of(service)?;
        self.record(RuntimeCall::Start { kind });
        self.await_ready(service).await
    }

    async fn status(&self, service: &ServiceHandle) -> Result<ServiceStatus, RuntimeError> {
        let kind = self.kind_of(service)?;
        self.record(RuntimeCall::Status { kind });
        let entry = self
            .services
            .get(&service.id)
            .ok_or_else(|| RuntimeError::UnknownService {
                service: service.name.clone()
            })?;
        let running =
            entry.started && !entry.terminated && !self.script.not_running.contains(&kind);
        Ok(ServiceStatus { running })
    }

    async fn host(&self, service: &ServiceHandle) -> Result<String, RuntimeError> {
        let kind = self.kind_of(service)?;
        self.record(RuntimeCall::Host { kind });
        Ok(FAKE_HOST.to_string())
    }

    async fn mapped_port(
        &self,
        service: &ServiceHandle,
        container_port: u16,
    ) -> Result<u16, RuntimeError> {
        let kind = self.kind_of(service)?;
        self.record(RuntimeCall::MappedPort {
            kind,
            port: container_port
        });
        Ok(FAKE_MAPPED_PORT)
    }

    async fn terminate(&self, service: &ServiceHandle) -> Result<(), RuntimeError> {
        let kind = self.kind_of(service)?;
        self.record(RuntimeCall::Terminate { kind });

        if self.script.fail_terminate.contains(&kind) {
            return Err(RuntimeError::operation(
                "terminate",
                &service.name,
                "scripted terminate failure"
            ));
        }

        let mut entry = self
            .services
            .get_mut(&service.id)
            .ok_or_else(|| RuntimeError::UnknownService {
                service: service.name.clone()
            })?;
        if entry.terminated {
            return Err(RuntimeError::AlreadyTerminated {
                service: service.name.clone()
            });
        }
        entry.terminated = true;
        Ok(())
    }
}
