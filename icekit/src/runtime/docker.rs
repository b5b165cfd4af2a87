//! [`ContainerRuntime`] backed by testcontainers.
//!
//! Containers are owned by the runtime; dropping it removes whatever is still
//! running. Networks are created by testcontainers on first use, so
//! `create_network` only reserves a unique name.

use super::probe;
use async_trait::async_trait;
use config::TimeoutConfig;
use dashmap::DashMap;
use errors::RuntimeError;
use icekit_core::{
    ContainerRuntime, NetworkHandle, Readiness, ServiceDescriptor, ServiceHandle, ServiceStatus,
};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::{ContainerPort, Mount, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ContainerRequest, GenericImage, ImageExt};
use uuid::Uuid;

/// Extra time granted to testcontainers' own startup timeout so that the
/// caller's bound on a timed probe always fires first.
const STARTUP_GRACE: Duration = Duration::from_secs(5);

const BRIDGE: &str = "bridge";

struct PendingStart {
    request: ContainerRequest<GenericImage>,
    port_probe: Option<(u16, Duration)>
}

enum Slot {
    Pending(Box<PendingStart>),
    Starting,
    Running(Arc<ContainerAsync<GenericImage>>),
    Terminated
}

/// Slots of terminated services are kept so that a repeated `terminate`
/// reports [`RuntimeError::AlreadyTerminated`]; one runtime therefore grows by
/// one small entry per service it ever created.
pub struct DockerRuntime {
    slots: DashMap<String, Slot>,
    startup_timeout: Duration,
    probe_interval: Duration
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default())
    }
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self {
            slots: DashMap::new(),
            startup_timeout: timeouts.startup(),
            probe_interval: timeouts.port_probe_interval()
        }
    }

    fn running(&self, service: &ServiceHandle) -> Result<Arc<ContainerAsync<GenericImage>>, RuntimeError> {
        match self.slots.get(&service.id).as_deref() {
            Some(Slot::Running(container)) => Ok(Arc::clone(container)),
            Some(Slot::Terminated) => Err(RuntimeError::AlreadyTerminated {
                service: service.name.clone()
            }),
            Some(Slot::Pending(_) | Slot::Starting) => Err(RuntimeError::operation(
                "inspect",
                &service.name,
                "container has not been started"
            )),
            None => Err(RuntimeError::UnknownService {
                service: service.name.clone()
            })
        }
    }

    fn startup_timeout_for(&self, descriptor: &ServiceDescriptor) -> Duration {
        descriptor
            .readiness
            .timeout()
            .map_or(self.startup_timeout, |bound| bound + STARTUP_GRACE)
    }

    async fn launch(
        &self,
        service: &ServiceHandle,
        pending: PendingStart,
    ) -> Result<ContainerAsync<GenericImage>, RuntimeError> {
        let container = pending
            .request
            .start()
            .await
            .map_err(|e| RuntimeError::operation("start", &service.name, e))?;
        tracing::info!("Started {} as container {}", service, container.id());

        if let Some((port, timeout)) = pending.port_probe {
            let host = container
                .get_host()
                .await
                .map_err(|e| RuntimeError::operation("host", &service.name, e))?
                .to_string();
            let mapped = container
                .get_host_port_ipv4(ContainerPort::Tcp(port))
                .await
                .map_err(|e| RuntimeError::operation("mapped port", &service.name, e))?;

            if !probe::wait_for_port(&host, mapped, timeout, self.probe_interval).await {
                return Err(RuntimeError::ReadinessTimeout {
                    service: service.name.clone(),
                    timeout_ms: timeout.as_millis() as u64
                });
            }
            tracing::debug!("{} is listening on {}:{}", service, host, mapped);
        }

        Ok(container)
    }
}

fn build_request(descriptor: &ServiceDescriptor, startup: Duration) -> ContainerRequest<GenericImage> {
    let mut image = GenericImage::new(descriptor.image.name.clone(), descriptor.image.tag.clone());
    for port in &descriptor.exposed_ports {
        image = image.with_exposed_port(ContainerPort::Tcp(*port));
    }
    if let Some(entrypoint) = &descriptor.entrypoint {
        image = image.with_entrypoint(entrypoint);
    }
    if let Readiness::LogPattern { pattern, .. } = &descriptor.readiness {
        image = image.with_wait_for(WaitFor::message_on_either_std(pattern.as_str()));
    }

    let mut request = image
        .with_network(descriptor.network.clone())
        .with_container_name(descriptor.container_name())
        .with_startup_timeout(startup);
    for (key, value) in &descriptor.env {
        request = request.with_env_var(key.clone(), value.clone());
    }
    for volume in &descriptor.volumes {
        request = request.with_mount(Mount::bind_mount(
            volume.host_path.display().to_string(),
            volume.container_path.clone(),
        ));
    }
    if !descriptor.cmd.is_empty() {
        request = request.with_cmd(descriptor.cmd.clone());
    }
    request
}

fn port_probe(readiness: &Readiness, default_timeout: Duration) -> Option<(u16, Duration)> {
    match readiness {
        Readiness::ListeningPort { port, timeout } => Some((*port, timeout.unwrap_or(default_timeout))),
        _ => None
    }
}

/// Unique, DNS-safe network name.
pub fn network_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("icekit-{}", &id[..12])
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_network(&self, driver: &str) -> Result<NetworkHandle, RuntimeError> {
        if driver != BRIDGE {
            return Err(RuntimeError::UnsupportedNetworkDriver {
                driver: driver.to_string()
            });
        }
        let name = network_name();
        tracing::debug!("Reserved {} network {}", driver, name);
        Ok(NetworkHandle {
            name,
            driver: driver.to_string()
        })
    }

    async fn create_container(
        &self,
        descriptor: ServiceDescriptor,
        auto_start: bool,
    ) -> Result<ServiceHandle, RuntimeError> {
        let service = ServiceHandle {
            id: Uuid::new_v4().to_string(),
            kind: descriptor.kind,
            name: descriptor.container_name()
        };
        if descriptor.network_aliases.len() > 1 {
            tracing::debug!(
                "{} is reachable only as {}; extra aliases are not applied",
                descriptor.kind,
                service.name
            );
        }

        let request = build_request(&descriptor, self.startup_timeout_for(&descriptor))
            .pull_image()
            .await
            .map_err(|e| RuntimeError::operation("pull", &service.name, e))?;
        let pending = PendingStart {
            request,
            port_probe: port_probe(&descriptor.readiness, self.startup_timeout)
        };
        tracing::debug!("Created {} from {}", service, descriptor.image);

        if auto_start {
            self.slots.insert(service.id.clone(), Slot::Starting);
            match self.launch(&service, pending).await {
                Ok(container) => {
                    self.slots
                        .insert(service.id.clone(), Slot::Running(Arc::new(container)));
                }
                Err(e) => {
                    // The caller never sees this handle.
                    self.slots.remove(&service.id);
                    return Err(e);
                }
            }
        } else {
            self.slots
                .insert(service.id.clone(), Slot::Pending(Box::new(pending)));
        }
        Ok(service)
    }

    async fn start(&self, service: &ServiceHandle) -> Result<(), RuntimeError> {
        let pending = match self.slots.get_mut(&service.id) {
            None => {
                return Err(RuntimeError::UnknownService {
                    service: service.name.clone()
                });
            }
            Some(mut slot) => match std::mem::replace(slot.value_mut(), Slot::Starting) {
                Slot::Pending(pending) => pending,
                previous => {
                    let err = match previous {
                        Slot::Terminated => RuntimeError::AlreadyTerminated {
                            service: service.name.clone()
                        },
                        _ => RuntimeError::AlreadyStarted {
                            service: service.name.clone()
                        }
                    };
                    *slot.value_mut() = previous;
                    return Err(err);
                }
            }
        };

        let container = self.launch(service, *pending).await?;
        self.slots
            .insert(service.id.clone(), Slot::Running(Arc::new(container)));
        Ok(())
    }

    async fn status(&self, service: &ServiceHandle) -> Result<ServiceStatus, RuntimeError> {
        let container = match self.running(service) {
            Ok(container) => container,
            Err(RuntimeError::Operation { .. }) => return Ok(ServiceStatus { running: false }),
            Err(e) => return Err(e)
        };
        let running = container
            .is_running()
            .await
            .map_err(|e| RuntimeError::operation("status", &service.name, e))?;
        Ok(ServiceStatus { running })
    }

    async fn host(&self, service: &ServiceHandle) -> Result<String, RuntimeError> {
        let container = self.running(service)?;
        let host = container
            .get_host()
            .await
            .map_err(|e| RuntimeError::operation("host", &service.name, e))?;
        Ok(host.to_string())
    }

    async fn mapped_port(
        &self,
        service: &ServiceHandle,
        container_port: u16,
    ) -> Result<u16, RuntimeError> {
        let container = self.running(service)?;
        container
            .get_host_port_ipv4(ContainerPort::Tcp(container_port))
            .await
            .map_err(|e| RuntimeError::operation("mapped port", &service.name, e))
    }

    async fn terminate(&self, service: &ServiceHandle) -> Result<(), RuntimeError> {
        let previous = match self.slots.get_mut(&service.id) {
            Some(mut slot) => std::mem::replace(slot.value_mut(), Slot::Terminated),
            None => {
                return Err(RuntimeError::UnknownService {
                    service: service.name.clone()
                });
            }
        };

        match previous {
            Slot::Terminated => Err(RuntimeError::AlreadyTerminated {
                service: service.name.clone()
            }),
            Slot::Pending(_) | Slot::Starting => {
                tracing::debug!("{} was never started; nothing to remove", service);
                Ok(())
            }
            Slot::Running(container) => match Arc::try_unwrap(container) {
                Ok(container) => container
                    .rm()
                    .await
                    .map_err(|e| RuntimeError::operation("terminate", &service.name, e)),
                Err(shared) => shared
                    .stop()
                    .await
                    .map_err(|e| RuntimeError::operation("terminate", &service.name, e))
            }
        }
    }
}
