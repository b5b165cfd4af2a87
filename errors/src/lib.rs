//! # icekit errors
//!
//! Error types shared by the fixture orchestrator and its collaborators.
//!
//! - [`FixtureError`]: the setup/teardown taxonomy surfaced to test code
//! - [`RuntimeError`]: failures reported by a container runtime
//! - [`SqlClientError`]: failures reported by a SQL client driver
//! - [`TeardownError`]: every termination failure collected by one teardown
//!
//! Third-party errors are flattened into `reason` strings at the adapter
//! boundary so this crate stays free of runtime-specific types.

use thiserror::Error;

/// Setup and teardown failures, one variant per pipeline failure mode.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Network creation failed: {reason}")]
    NetworkCreationFailed { reason: String },

    #[error("Descriptor for {service} could not be built: {reason}")]
    DescriptorBuildFailed { service: String, reason: String },

    #[error("Service {service} failed to start: {reason}")]
    ServiceStartFailed { service: String, reason: String },

    #[error("Service {service} is not healthy: {reason}")]
    DependencyUnhealthy { service: String, reason: String },

    #[error("Service {service} was not ready within {timeout_ms}ms")]
    ReadinessTimeout { service: String, timeout_ms: u64 },

    #[error("SQL client could not be opened for {dsn}: {reason}")]
    ClientOpenFailed { dsn: String, reason: String },

    #[error("Setup cancelled while {step}")]
    Cancelled { step: String },

    #[error("Termination of {service} failed: {reason}")]
    TerminationFailed { service: String, reason: String }
}

impl FixtureError {
    /// Maps a runtime failure raised while starting `service`.
    pub fn from_start(service: &str, err: RuntimeError) -> Self {
        match err {
            RuntimeError::ReadinessTimeout { timeout_ms, .. } => Self::ReadinessTimeout {
                service: service.to_string(),
                timeout_ms
            },
            other => Self::ServiceStartFailed {
                service: service.to_string(),
                reason: other.to_string()
            }
        }
    }
}

/// Container runtime failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unsupported network driver: {driver}")]
    UnsupportedNetworkDriver { driver: String },

    #[error("Unknown service handle: {service}")]
    UnknownService { service: String },

    #[error("Service {service} was already terminated")]
    AlreadyTerminated { service: String },

    #[error("Service {service} has already been started")]
    AlreadyStarted { service: String },

    #[error("Readiness probe for {service} timed out after {timeout_ms}ms")]
    ReadinessTimeout { service: String, timeout_ms: u64 },

    #[error("{operation} on {service} failed: {reason}")]
    Operation {
        operation: String,
        service: String,
        reason: String
    }
}

impl RuntimeError {
    pub fn operation(operation: &str, service: &str, reason: impl ToString) -> Self {
        Self::Operation {
            operation: operation.to_string(),
            service: service.to_string(),
            reason: reason.to_string()
        }
    }

    /// True when the failure only means there is nothing left to terminate.
    pub fn is_already_terminated(&self) -> bool {
        matches!(self, Self::AlreadyTerminated { .. })
    }
}

/// SQL client failures.
#[derive(Debug, Error)]
pub enum SqlClientError {
    #[error("Invalid DSN {dsn}: {reason}")]
    InvalidDsn { dsn: String, reason: String },

    #[error("Client is closed")]
    Closed,

    #[error("Client was already closed")]
    AlreadyClosed,

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Query failed: {error_name}: {message}")]
    Query { error_name: String, message: String }
}

/// Aggregate of every failure observed during one teardown.
#[derive(Debug, Error)]
#[error("Teardown finished with {} failure(s): {}", failures.len(), summary(failures))]
pub struct TeardownError {
    pub failures: Vec<FixtureError>
}

fn summary(failures: &[FixtureError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_timeout_keeps_its_kind() {
        let err = FixtureError::from_start(
            "catalog",
            RuntimeError::ReadinessTimeout {
                service: "catalog".to_string(),
                timeout_ms: 30_000
            }
        );
        assert!(matches!(
            err,
            FixtureError::ReadinessTimeout { timeout_ms: 30_000, .. }
        ));
    }

    #[test]
    fn test_other_runtime_errors_become_start_failures() {
        let err = FixtureError::from_start(
            "object-store",
            RuntimeError::operation("start", "object-store", "image not found")
        );
        match err {
            FixtureError::ServiceStartFailed { service, reason } => {
                assert_eq!(service, "object-store");
                assert!(reason.contains("image not found"));
            }
            other => panic!("unexpected error: {other:?}")
        }
    }

    #[test]
    fn test_teardown_error_lists_every_failure() {
        let err = TeardownError {
            failures: vec![
                FixtureError::TerminationFailed {
                    service: "query-engine".to_string(),
                    reason: "daemon gone".to_string()
                },
                FixtureError::TerminationFailed {
                    service: "catalog".to_string(),
                    reason: "timeout".to_string()
                },
            ]
        };
        let message = err.to_string();
        assert!(message.starts_with("Teardown finished with 2 failure(s)"));
        assert!(message.contains("query-engine"));
        assert!(message.contains("catalog"));
    }
}
