//! Values exchanged with the container runtime
//!
//! These are the only fields the controller knows about a container. Anything
//! else the runtime tracks stays on its side of the port.

use serde::{Deserialize, Serialize};

use crate::engine::ids::ContainerId;

/// GPUs to hand to a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuRequest {
    #[default]
    None,
    All,
    Count(u32),
}

impl GpuRequest {
    /// Interpret a service's `gpu_count`: 0 none, negative all, positive that many
    pub fn from_count(count: i32) -> Self {
        match count {
            0 => Self::None,
            n if n < 0 => Self::All,
            n => Self::Count(n.unsigned_abs()),
        }
    }

    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Everything the runtime needs to start one replica
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub image: String,
    pub replica_name: String,
    pub gpus: GpuRequest,
    /// Port published on the host, 0 when nothing is published
    pub host_port: u16,
    pub container_port: u16,
    /// Remove the container once it stops
    pub auto_remove: bool,
}

impl StartRequest {
    pub fn publishes_port(&self) -> bool {
        self.host_port > 0
    }
}

/// A container the runtime knows about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    id: ContainerId,
    /// Address inside the runtime's own network
    internal_address: Option<String>,
    /// URL reachable from the host, e.g. `http://localhost:20001`
    external_url: Option<String>,
}

impl ContainerHandle {
    pub fn new(id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            internal_address: None,
            external_url: None,
        }
    }

    pub fn with_internal_address(mut self, address: impl Into<String>) -> Self {
        self.internal_address = Some(address.into()).filter(|a: &String| !a.is_empty());
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }

    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    pub fn internal_address(&self) -> Option<&str> {
        self.internal_address.as_deref()
    }

    pub fn external_url(&self) -> Option<&str> {
        self.external_url.as_deref()
    }

    pub fn has_external_url(&self) -> bool {
        self.external_url.is_some()
    }
}

/// Lookup of an existing container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindQuery {
    pub image: String,
}

impl FindQuery {
    pub fn by_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

/// Raw answer of a deployed service's own API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_request_from_count() {
        assert_eq!(GpuRequest::from_count(0), GpuRequest::None);
        assert_eq!(GpuRequest::from_count(-1), GpuRequest::All);
        assert_eq!(GpuRequest::from_count(2), GpuRequest::Count(2));
        assert!(!GpuRequest::None.is_requested());
    }

    #[test]
    fn test_handle_ignores_empty_addresses() {
        let handle = ContainerHandle::new("abc")
            .with_internal_address("")
            .with_external_url("http://localhost:20001");

        assert_eq!(handle.internal_address(), None);
        assert_eq!(handle.external_url(), Some("http://localhost:20001"));
    }
}
