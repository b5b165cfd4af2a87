//! Fixture teardown.
//!
//! Every resource gets a termination attempt even when earlier ones fail.
//! Resources that are already gone are skipped, so tearing down the same
//! fixture twice succeeds.

use crate::orchestrator::{Fixture, PartialSetup};
use errors::{FixtureError, SqlClientError, TeardownError};
use icekit_core::{ContainerRuntime, ServiceHandle, ServiceKind};

/// Order: query engine, SQL client, metadata store, object store, bootstrap,
/// catalog.
pub async fn teardown(runtime: &dyn ContainerRuntime, fixture: &Fixture) -> Result<(), TeardownError> {
    tracing::info!("Tearing down fixture on network {}", fixture.network().name);
    let mut failures = Vec::new();

    terminate_service(runtime, fixture.query_engine(), &mut failures).await;

    match fixture.sql().close().await {
        Ok(()) => tracing::debug!("Closed SQL client for {}", fixture.dsn()),
        Err(SqlClientError::AlreadyClosed) => {
            tracing::warn!("SQL client for {} was already closed", fixture.dsn());
        }
        Err(e) => {
            tracing::error!("Closing SQL client failed: {}", e);
            failures.push(FixtureError::TerminationFailed {
                service: "sql-client".to_string(),
                reason: e.to_string()
            });
        }
    }

    for kind in [
        ServiceKind::MetadataStore,
        ServiceKind::ObjectStore,
        ServiceKind::ObjectStoreBootstrap,
        ServiceKind::Catalog,
    ] {
        terminate_service(runtime, fixture.service(kind), &mut failures).await;
    }

    finish(failures)
}

/// Terminates what a failed setup left behind, newest first.
pub async fn cleanup_partial(
    runtime: &dyn ContainerRuntime,
    partial: &PartialSetup,
) -> Result<(), TeardownError> {
    tracing::info!(
        "Cleaning up {} service(s) from a failed setup",
        partial.services.len()
    );
    let mut failures = Vec::new();
    for handle in partial.services.iter().rev() {
        terminate_service(runtime, handle, &mut failures).await;
    }
    finish(failures)
}

async fn terminate_service(
    runtime: &dyn ContainerRuntime,
    handle: &ServiceHandle,
    failures: &mut Vec<FixtureError>,
) {
    match runtime.terminate(handle).await {
        Ok(()) => tracing::info!("Terminated {}", handle),
        Err(e) if e.is_already_terminated() => {
            tracing::warn!("{} was already terminated", handle);
        }
        Err(e) => {
            tracing::error!("Failed to terminate {}: {}", handle, e);
            failures.push(FixtureError::TerminationFailed {
                service: handle.kind.to_string(),
                reason: e.to_string()
            });
        }
    }
}

fn finish(failures: Vec<FixtureError>) -> Result<(), TeardownError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(TeardownError { failures })
    }
}
