//! # Podline Domain Layer
//!
//! Pure core of the Podline container controller. It follows hexagonal
//! architecture principles:
//!
//! - **Envelopes & pipelines**: every fallible step returns an [`Envelope`];
//!   [`Pipeline`]s chain them and stop at the first failure
//! - **Entities**: [`Service`] (desired state) and [`Pod`] (running state),
//!   correlated by [`PodKey`]
//! - **Ports**: [`ContainerRuntime`], implemented by adapter crates
//! - **Services**: [`PortAllocator`], [`PodController`], [`ServiceRegistry`]
//!
//! ## Architecture
//!
//! This layer has NO dependencies on Docker or HTTP. The container runtime is
//! a trait the infrastructure layer implements.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use podline_domain::{ContainerRuntime, PodController, PortAllocator, Service, ServiceRegistry};
//!
//! async fn example<R: ContainerRuntime>(runtime: R) {
//!     let controller = PodController::with_runtime(runtime, PortAllocator::default());
//!     let registry = ServiceRegistry::new(Arc::new(controller));
//!
//!     let service = Service::new("/web", "/", "nginx:alpine", 80).with_replicas(2);
//!     let deployed = registry.set(service).await;
//!     println!("deployed: {}", deployed.is_ok());
//! }
//! ```

pub mod engine;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod ports;

// Re-export commonly used types
pub use engine::{
    ContainerHandle, ContainerId, Deployable, Keyed, Pod, PodController, PodKey, PortAllocator,
    PortRange, Service, ServiceRegistry, StopReport,
};
pub use envelope::{Envelope, ErrorCode};
pub use error::{DomainError, Result};
pub use pipeline::Pipeline;
pub use ports::ContainerRuntime;
