//! # Podline Docker Adapter
//!
//! Implements the domain's `ContainerRuntime` port on top of the `docker`
//! command line, plus HTTP calls into deployed containers.

mod error;
pub mod infrastructure;

pub use error::{DockerError, Result};
pub use infrastructure::{DockerCliRuntime, DockerConfig};
