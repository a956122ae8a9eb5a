//! Service registry - endpoint to desired state
//!
//! The registry is the entry point of the control surface. It stores one
//! [`Service`] per host endpoint and drives the [`PodController`].
//!
//! Replacing the service of an endpoint that is already registered only
//! replaces the stored definition. Running pods are not reconciled to the
//! new spec; remove and set the service again to roll it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::controller::{PodController, StopReport};
use super::entity::{Deployable, Keyed, Service};
use crate::envelope::Envelope;
use crate::pipeline::Pipeline;
use crate::ports::ContainerRuntime;

pub struct ServiceRegistry<R> {
    controller: Arc<PodController<R>>,
    services: Mutex<HashMap<String, Service>>,
}

impl<R> ServiceRegistry<R>
where
    R: ContainerRuntime,
{
    pub fn new(controller: Arc<PodController<R>>) -> Self {
        Self {
            controller,
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Register `service` under its host endpoint
    ///
    /// A new endpoint is stored and deployed; the envelope carries `true` if
    /// at least one replica started. A known endpoint gets its definition
    /// replaced and nothing is deployed.
    pub async fn set(&self, service: Service) -> Envelope<bool> {
        let endpoint = service.host_endpoint.clone();

        let added = match self.services.lock().await.entry(endpoint.clone()) {
            Entry::Occupied(mut stored) => {
                stored.insert(service.clone());
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(service.clone());
                true
            }
        };

        if !added {
            info!(endpoint = %endpoint, "Service endpoint updated, running pods left as they are");
            return Envelope::ok_with_message(
                true,
                "Service definition replaced, running pods left as they are",
            );
        }

        Pipeline::start(Deployable::from(service))
            .log(format!("Service added as {} endpoint", endpoint))
            .pass(move |spec| async move { self.controller.deploy(&spec).await })
            .resolve()
            .await
            .project_or(true, false)
    }

    /// Unregister `host_endpoint` and stop its pods
    ///
    /// Returns `None` when the endpoint was never registered.
    pub async fn remove(
        &self,
        host_endpoint: &str,
        cancel: &CancellationToken,
    ) -> Option<StopReport> {
        let removed = self.services.lock().await.remove(host_endpoint);

        match removed {
            Some(service) => {
                let report = self.controller.stop(service.pod_key(), cancel).await;
                info!(
                    endpoint = %host_endpoint,
                    attempted = report.attempted(),
                    stopped = report.stopped,
                    failed = report.failed,
                    cancelled = report.cancelled,
                    "Service removed from endpoint"
                );
                Some(report)
            }
            None => {
                warn!(endpoint = %host_endpoint, "Service endpoint not found");
                None
            }
        }
    }

    pub async fn get(&self, host_endpoint: &str) -> Option<Service> {
        self.services.lock().await.get(host_endpoint).cloned()
    }

    /// Registered services ordered by endpoint
    pub async fn list(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.services.lock().await.values().cloned().collect();
        services.sort_by(|a, b| a.host_endpoint.cmp(&b.host_endpoint));
        services
    }

    /// Stop every pod the controller tracks
    pub async fn shutdown(&self, cancel: &CancellationToken) -> StopReport {
        self.controller.shutdown(cancel).await
    }

    pub fn controller(&self) -> &Arc<PodController<R>> {
        &self.controller
    }
}
