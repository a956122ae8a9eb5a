//! Deployment engine
//!
//! Identity keys, the service/pod model, host port allocation, the pod
//! controller and the service registry that drives it.

mod container;
mod controller;
mod entity;
mod ids;
mod port_allocator;
mod registry;

pub use container::{ContainerHandle, FindQuery, GpuRequest, InvokeResponse, StartRequest};
pub use controller::{ControllerConfig, PodController, StopReport};
pub use entity::{Deployable, Keyed, Pod, Service};
pub use ids::{ContainerId, PodKey};
pub use port_allocator::{find_free_port, PortAllocator, PortRange};
pub use registry::ServiceRegistry;
