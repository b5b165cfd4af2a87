//! Container runtime adapters.

pub mod docker;
pub mod probe;

pub use docker::DockerRuntime;
