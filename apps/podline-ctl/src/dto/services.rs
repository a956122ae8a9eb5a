//! DTOs for service endpoints

use chrono::{DateTime, Utc};
use podline_domain::{Deployable, Pod, Service, StopReport};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_kind() -> String {
    "service".to_string()
}

fn default_replicas() -> u32 {
    1
}

/// Request body for setting a service
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetServiceRequest {
    /// Kind of deployable, only `service` can be deployed
    #[serde(default = "default_kind")]
    #[schema(example = "service")]
    pub kind: String,
    /// Endpoint exposed on the host
    #[schema(example = "/llama")]
    pub host_endpoint: String,
    /// Endpoint inside the container calls are forwarded to
    #[schema(example = "/api")]
    pub container_endpoint: String,
    #[schema(example = "ollama/ollama")]
    pub image: String,
    #[serde(default = "default_replicas")]
    #[schema(example = 2)]
    pub replicas: u32,
    /// 0 for none, negative for all GPUs, positive for that many
    #[serde(default)]
    #[schema(example = 0)]
    pub gpu_count: i32,
    #[schema(example = 11434)]
    pub container_port: u16,
}

impl SetServiceRequest {
    pub fn into_deployable(self) -> Deployable {
        if !self.kind.eq_ignore_ascii_case("service") {
            return Deployable::Unsupported { kind: self.kind };
        }

        Deployable::Service(
            Service::new(
                self.host_endpoint,
                self.container_endpoint,
                self.image,
                self.container_port,
            )
            .with_replicas(self.replicas)
            .with_gpu_count(self.gpu_count),
        )
    }
}

/// Response body for a set request
#[derive(Debug, Serialize, ToSchema)]
pub struct SetServiceResponse {
    /// Whether at least one replica runs for the endpoint
    pub deployed: bool,
    #[schema(example = "Started 2 of 2 replicas")]
    pub message: String,
}

/// A running replica
#[derive(Debug, Serialize, ToSchema)]
pub struct PodResponse {
    #[schema(example = "4f2a9c0e1b7d")]
    pub container_id: String,
    #[schema(example = "http://localhost:20001")]
    pub external_url: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl From<&Pod> for PodResponse {
    fn from(pod: &Pod) -> Self {
        Self {
            container_id: pod.container().id().short().to_string(),
            external_url: pod.container().external_url().map(str::to_string),
            started_at: *pod.started_at(),
        }
    }
}

/// A registered service
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceResponse {
    /// Stable identity of the service, hex encoded
    #[schema(example = "5f0c3a9e12d4b871")]
    pub key: String,
    pub host_endpoint: String,
    pub container_endpoint: String,
    pub image: String,
    pub replicas: u32,
    pub gpu_count: i32,
    pub container_port: u16,
    /// Replicas currently running
    pub pods: Vec<PodResponse>,
}

impl ServiceResponse {
    pub fn new(service: Service, key: String, pods: &[Pod]) -> Self {
        Self {
            key,
            host_endpoint: service.host_endpoint,
            container_endpoint: service.container_endpoint,
            image: service.image,
            replicas: service.replicas,
            gpu_count: service.gpu_count,
            container_port: service.container_port,
            pods: pods.iter().map(PodResponse::from).collect(),
        }
    }
}

/// Outcome of removing a service
#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveServiceResponse {
    /// Pods stopped
    pub stopped: usize,
    /// Pods the runtime failed to stop
    pub failed: usize,
    /// Pods left running because the request was cancelled
    pub cancelled: usize,
}

impl From<StopReport> for RemoveServiceResponse {
    fn from(report: StopReport) -> Self {
        Self {
            stopped: report.stopped,
            failed: report.failed,
            cancelled: report.cancelled,
        }
    }
}
