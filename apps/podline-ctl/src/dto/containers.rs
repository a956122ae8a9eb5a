//! DTOs for container endpoints

use podline_domain::ContainerHandle;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query of the container lookup
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContainerQuery {
    /// Image the container runs
    #[param(example = "nginx:alpine")]
    pub image: String,
}

/// A container known to the runtime
#[derive(Debug, Serialize, ToSchema)]
pub struct ContainerResponse {
    #[schema(example = "4f2a9c0e1b7d")]
    pub id: String,
    /// Address on the container network
    #[schema(example = "172.17.0.2")]
    pub internal_address: Option<String>,
    /// URL reachable from the host
    #[schema(example = "http://localhost:20001")]
    pub external_url: Option<String>,
}

impl From<&ContainerHandle> for ContainerResponse {
    fn from(handle: &ContainerHandle) -> Self {
        Self {
            id: handle.id().to_string(),
            internal_address: handle.internal_address().map(str::to_string),
            external_url: handle.external_url().map(str::to_string),
        }
    }
}
