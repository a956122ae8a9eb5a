//! Desired and running state
//!
//! A [`Service`] is what an operator asks for. A [`Pod`] is one container that
//! was actually started for it. They meet through the [`PodKey`] both carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{container::ContainerHandle, ids::PodKey};

/// Capability of every deployable spec: a stable identity
pub trait Keyed {
    fn pod_key(&self) -> PodKey;
}

fn default_replicas() -> u32 {
    1
}

/// Declarative description of a service
///
/// Identity is `(host_endpoint, container_endpoint, image)`. Replica count,
/// GPUs and the container port can change without changing the key.
///
/// # Example
///
/// ```rust
/// use podline_domain::engine::{Keyed, Service};
///
/// let v1 = Service::new("/llama", "/api", "ollama/ollama", 11434).with_replicas(1);
/// let v2 = v1.clone().with_replicas(3).with_gpu_count(-1);
/// assert_eq!(v1.pod_key(), v2.pod_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Endpoint users call on the host
    pub host_endpoint: String,
    /// Endpoint forwarded into the container
    pub container_endpoint: String,
    /// Image to run
    pub image: String,
    /// Number of containers to keep running
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// 0 for none, negative for all GPUs, positive for that many
    #[serde(default)]
    pub gpu_count: i32,
    /// Port the container listens on, the host port is picked automatically
    pub container_port: u16,
}

impl Service {
    pub fn new(
        host_endpoint: impl Into<String>,
        container_endpoint: impl Into<String>,
        image: impl Into<String>,
        container_port: u16,
    ) -> Self {
        Self {
            host_endpoint: host_endpoint.into(),
            container_endpoint: container_endpoint.into(),
            image: image.into(),
            replicas: default_replicas(),
            gpu_count: 0,
            container_port,
        }
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_gpu_count(mut self, gpu_count: i32) -> Self {
        self.gpu_count = gpu_count;
        self
    }

    /// Container name for one replica
    ///
    /// Names must be unique on the runtime, so a fresh suffix is appended on
    /// every call.
    pub fn replica_name(&self, index: u32) -> String {
        let slug: String = self
            .host_endpoint
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let slug = slug.trim_matches('-');
        let slug = if slug.is_empty() { "service" } else { slug };

        let suffix = Uuid::now_v7().simple().to_string();
        format!("podline-{}-{}-{}", slug, index, &suffix[suffix.len() - 8..])
    }
}

impl Keyed for Service {
    fn pod_key(&self) -> PodKey {
        PodKey::digest([
            self.host_endpoint.as_str(),
            self.container_endpoint.as_str(),
            self.image.as_str(),
        ])
    }
}

/// Every kind of spec the controller may be asked to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployable {
    Service(Service),
    /// A kind that arrived over the wire but has no deploy implementation
    Unsupported { kind: String },
}

impl Deployable {
    pub fn kind(&self) -> &str {
        match self {
            Self::Service(_) => "service",
            Self::Unsupported { kind } => kind,
        }
    }

    /// Identity of the spec, `None` for unsupported kinds
    pub fn pod_key(&self) -> Option<PodKey> {
        match self {
            Self::Service(service) => Some(service.pod_key()),
            Self::Unsupported { .. } => None,
        }
    }
}

impl From<Service> for Deployable {
    fn from(service: Service) -> Self {
        Self::Service(service)
    }
}

/// One running container bound to an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    key: PodKey,
    container: ContainerHandle,
    started_at: DateTime<Utc>,
}

impl Pod {
    pub fn new(key: PodKey, container: ContainerHandle) -> Self {
        Self {
            key,
            container,
            started_at: Utc::now(),
        }
    }

    pub fn key(&self) -> PodKey {
        self.key
    }

    pub fn container(&self) -> &ContainerHandle {
        &self.container
    }

    pub fn started_at(&self) -> &DateTime<Utc> {
        &self.started_at
    }
}
