//! Shared test helpers for the icekit workspace.
//!
//! - [`FakeRuntime`]: scripted [`ContainerRuntime`](icekit_core::ContainerRuntime)
//!   that records every call
//! - [`FakeSqlConnector`]: scripted SQL driver
//! - [`unique_id`], [`init_tracing`], [`docker_available`]

mod helpers;
mod runtime;
mod sql;

pub use helpers::*;
pub use runtime::{FAKE_HOST, FAKE_MAPPED_PORT, FakeRuntime, RuntimeCall};
pub use sql::{FakeSqlClient, FakeSqlConnector};
