//! Infrastructure adapters backed by Docker

pub mod cli;
mod docker_runtime;

pub use docker_runtime::{DockerCliRuntime, DockerConfig};
