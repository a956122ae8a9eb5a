//! Pod controller - replica deployment and teardown
//!
//! The controller owns the live-pod collection. It turns a [`Deployable`] into
//! running containers through the runtime port and stops them again by key.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    container::{ContainerHandle, GpuRequest, InvokeResponse, StartRequest},
    entity::{Deployable, Keyed, Pod, Service},
    ids::PodKey,
    port_allocator::PortAllocator,
};
use crate::envelope::{status, Envelope, ErrorCode};
use crate::pipeline::Pipeline;
use crate::ports::ContainerRuntime;

/// Configuration for the pod controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Pass GPU requests to the runtime; when off they are dropped
    pub gpu_enabled: bool,
    /// Ask the runtime to remove containers once stopped
    pub auto_remove: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gpu_enabled: false,
            auto_remove: true,
        }
    }
}

/// Outcome of a best-effort stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReport {
    /// Pods stopped and removed from the live collection
    pub stopped: usize,
    /// Pods the runtime failed to stop, still live
    pub failed: usize,
    /// Pods left alone because the stop was cancelled, still live
    pub cancelled: usize,
}

impl StopReport {
    pub fn attempted(&self) -> usize {
        self.stopped + self.failed + self.cancelled
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Deploys replicas and tracks the pods they became
///
/// ## Partial failure
///
/// Replicas are started one after the other. A replica that fails is logged
/// and skipped; the deploy is ok as soon as one replica runs and reports how
/// many did.
pub struct PodController<R> {
    runtime: R,
    ports: PortAllocator,
    pods: Mutex<Vec<Pod>>,
    config: ControllerConfig,
}

impl<R> PodController<R>
where
    R: ContainerRuntime,
{
    pub fn new(runtime: R, ports: PortAllocator, config: ControllerConfig) -> Self {
        Self {
            runtime,
            ports,
            pods: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Controller with default configuration
    pub fn with_runtime(runtime: R, ports: PortAllocator) -> Self {
        Self::new(runtime, ports, ControllerConfig::default())
    }

    /// Start every replica of `spec`
    ///
    /// # Returns
    ///
    /// The number of replicas started, which may be lower than requested
    ///
    /// # Errors
    ///
    /// - `RunContainerFail` (status 417) when no replica started
    /// - `UnimplementedKeyVariant` (status 500) for unsupported kinds, with
    ///   the pod collection untouched
    pub async fn deploy(&self, spec: &Deployable) -> Envelope<usize> {
        match spec {
            Deployable::Service(service) => self.deploy_service(service).await,
            Deployable::Unsupported { kind } => {
                warn!(kind = %kind, "Deploy requested for unsupported kind");
                Envelope::not_ok(
                    status::INTERNAL_SERVER_ERROR,
                    ErrorCode::UnimplementedKeyVariant,
                    format!("No deploy implementation for kind '{}'", kind),
                )
            }
        }
    }

    async fn deploy_service(&self, service: &Service) -> Envelope<usize> {
        let key = service.pod_key();
        let mut deployed = 0usize;

        for index in 0..service.replicas {
            let started = self.start_replica(service, key, index).await;
            if started.is_not_ok() {
                warn!(
                    key = %key,
                    replica = index,
                    code = %started.code(),
                    message = started.message(),
                    "Replica failed to start"
                );
                continue;
            }

            let handle = started.into_value();
            info!(key = %key, replica = index, container = %handle.id().short(), "Replica started");
            self.pods.lock().await.push(Pod::new(key, handle));
            deployed += 1;
        }

        if deployed == 0 {
            return Envelope::not_ok(
                status::EXPECTATION_FAILED,
                ErrorCode::RunContainerFail,
                format!(
                    "No replica of {} started ({} requested)",
                    service.host_endpoint, service.replicas
                ),
            );
        }

        info!(
            key = %key,
            endpoint = %service.host_endpoint,
            deployed,
            requested = service.replicas,
            "Service deployed"
        );
        Envelope::ok_with_message(
            deployed,
            format!("Started {} of {} replicas", deployed, service.replicas),
        )
    }

    async fn start_replica(
        &self,
        service: &Service,
        key: PodKey,
        index: u32,
    ) -> Envelope<ContainerHandle> {
        let gpus = self.gpu_request(service);
        let auto_remove = self.config.auto_remove;

        Pipeline::begin(|| self.ports.allocate(key.for_replica(index)))
            .map(move |host_port| StartRequest {
                image: service.image.clone(),
                replica_name: service.replica_name(index),
                gpus,
                host_port,
                container_port: service.container_port,
                auto_remove,
            })
            .pass(|request| self.runtime.start(request))
            .resolve()
            .await
    }

    fn gpu_request(&self, service: &Service) -> GpuRequest {
        let requested = GpuRequest::from_count(service.gpu_count);
        if requested.is_requested() && !self.config.gpu_enabled {
            warn!(
                endpoint = %service.host_endpoint,
                gpu_count = service.gpu_count,
                "GPU support disabled, starting without GPUs"
            );
            return GpuRequest::None;
        }
        requested
    }

    /// Stop every live pod with `key`
    ///
    /// Best-effort: a pod that fails to stop stays live and the remaining pods
    /// are still attempted. Once `cancel` fires, pending pods are left live so
    /// a later call can find them again.
    pub async fn stop(&self, key: PodKey, cancel: &CancellationToken) -> StopReport {
        let targets: Vec<Pod> = self
            .pods
            .lock()
            .await
            .iter()
            .filter(|pod| pod.key() == key)
            .cloned()
            .collect();

        self.stop_pods(targets, cancel).await
    }

    /// Stop every live pod, whatever its key
    ///
    /// This is the explicit teardown the host runs when it shuts down.
    pub async fn shutdown(&self, cancel: &CancellationToken) -> StopReport {
        let targets = self.pods.lock().await.clone();
        info!(pods = targets.len(), "Stopping all pods");
        self.stop_pods(targets, cancel).await
    }

    async fn stop_pods(&self, targets: Vec<Pod>, cancel: &CancellationToken) -> StopReport {
        let mut report = StopReport::default();

        for pod in targets {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                stopped = self.runtime.stop(pod.container()) => Some(stopped),
            };

            match outcome {
                None => {
                    warn!(key = %pod.key(), container = %pod.container().id().short(), "Stop cancelled");
                    report.cancelled += 1;
                }
                Some(stopped) if stopped.is_ok() => {
                    self.remove_pod(&pod).await;
                    info!(key = %pod.key(), container = %pod.container().id().short(), "Pod stopped");
                    report.stopped += 1;
                }
                Some(stopped) => {
                    warn!(
                        key = %pod.key(),
                        container = %pod.container().id().short(),
                        code = %stopped.code(),
                        message = stopped.message(),
                        "Pod failed to stop"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn remove_pod(&self, pod: &Pod) {
        let mut pods = self.pods.lock().await;
        if let Some(position) = pods
            .iter()
            .position(|live| live.container().id() == pod.container().id())
        {
            pods.remove(position);
        }
    }

    /// POST `payload` to `path` on the first reachable pod with `key`
    ///
    /// # Errors
    ///
    /// - `GetContainerFail` (status 404) when no live pod has a host URL
    /// - whatever the runtime reports for the call itself
    pub async fn invoke(
        &self,
        key: PodKey,
        path: &str,
        payload: serde_json::Value,
    ) -> Envelope<InvokeResponse> {
        let target = self
            .pods
            .lock()
            .await
            .iter()
            .find(|pod| pod.key() == key && pod.container().has_external_url())
            .map(|pod| pod.container().clone());

        let lookup = match target {
            Some(handle) => Envelope::ok(handle),
            None => Envelope::not_ok(
                status::NOT_FOUND,
                ErrorCode::GetContainerFail,
                format!("No reachable pod for key {}", key),
            ),
        };

        Pipeline::from_envelope(lookup)
            .pass(move |handle| async move { self.runtime.invoke(&handle, path, payload).await })
            .resolve()
            .await
    }

    /// Live pods with `key`
    pub async fn pods(&self, key: PodKey) -> Vec<Pod> {
        self.pods
            .lock()
            .await
            .iter()
            .filter(|pod| pod.key() == key)
            .cloned()
            .collect()
    }

    /// Number of live pods across all keys
    pub async fn pod_count(&self) -> usize {
        self.pods.lock().await.len()
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::container::FindQuery;
    use crate::engine::port_allocator::PortRange;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // Runtime whose start/stop outcomes are scripted per call
    #[derive(Default)]
    struct ScriptedRuntime {
        starts: StdMutex<VecDeque<bool>>,
        stops: StdMutex<VecDeque<bool>>,
        requests: StdMutex<Vec<StartRequest>>,
        next_id: AtomicUsize,
    }

    impl ScriptedRuntime {
        fn with_starts(outcomes: &[bool]) -> Self {
            let runtime = Self::default();
            runtime.starts.lock().unwrap().extend(outcomes);
            runtime
        }

        fn script_stops(&self, outcomes: &[bool]) {
            self.stops.lock().unwrap().extend(outcomes);
        }
    }

    impl ContainerRuntime for ScriptedRuntime {
        fn start(
            &self,
            request: StartRequest,
        ) -> impl std::future::Future<Output = Envelope<ContainerHandle>> + Send {
            let succeed = self.starts.lock().unwrap().pop_front().unwrap_or(true);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let url = format!("http://localhost:{}", request.host_port);
            self.requests.lock().unwrap().push(request);

            async move {
                if succeed {
                    Envelope::ok(ContainerHandle::new(format!("container-{}", id)).with_external_url(url))
                } else {
                    Envelope::not_ok(
                        status::INTERNAL_SERVER_ERROR,
                        ErrorCode::RunContainerFail,
                        "image not found",
                    )
                }
            }
        }

        fn stop(
            &self,
            handle: &ContainerHandle,
        ) -> impl std::future::Future<Output = Envelope<ContainerHandle>> + Send {
            let succeed = self.stops.lock().unwrap().pop_front().unwrap_or(true);
            let handle = handle.clone();

            async move {
                if succeed {
                    Envelope::ok(handle)
                } else {
                    Envelope::not_ok_with_value(
                        status::INTERNAL_SERVER_ERROR,
                        ErrorCode::StopContainerFail,
                        "daemon busy",
                        handle,
                    )
                }
            }
        }

        fn find(
            &self,
            _query: FindQuery,
        ) -> impl std::future::Future<Output = Envelope<ContainerHandle>> + Send {
            async { Envelope::not_ok(status::NOT_FOUND, ErrorCode::GetContainerFail, "") }
        }

        fn invoke(
            &self,
            handle: &ContainerHandle,
            path: &str,
            payload: serde_json::Value,
        ) -> impl std::future::Future<Output = Envelope<InvokeResponse>> + Send {
            let body = serde_json::json!({
                "url": format!("{}{}", handle.external_url().unwrap_or_default(), path),
                "echo": payload,
            });
            async move { Envelope::ok(InvokeResponse { status: 200, body }) }
        }
    }

    fn controller(runtime: ScriptedRuntime) -> PodController<ScriptedRuntime> {
        let range = PortRange::new(43300, 43399).unwrap();
        PodController::with_runtime(runtime, PortAllocator::new(range))
    }

    fn web(replicas: u32) -> Service {
        Service::new("/web", "/", "nginx:alpine", 80).with_replicas(replicas)
    }

    #[tokio::test]
    async fn test_deploy_all_replicas() {
        let controller = controller(ScriptedRuntime::default());

        let result = controller.deploy(&web(3).into()).await;

        assert!(result.is_ok());
        assert_eq!(*result.value(), 3);
        assert_eq!(result.message(), "Started 3 of 3 replicas");
        assert_eq!(controller.pods(web(3).pod_key()).await.len(), 3);
    }

    #[tokio::test]
    async fn test_deploy_one_of_three() {
        let controller = controller(ScriptedRuntime::with_starts(&[false, true, false]));

        let result = controller.deploy(&web(3).into()).await;

        assert!(result.is_ok());
        assert_eq!(*result.value(), 1);
        assert_eq!(result.message(), "Started 1 of 3 replicas");
        assert_eq!(controller.pod_count().await, 1);
    }

    #[tokio::test]
    async fn test_deploy_none_of_three() {
        let controller = controller(ScriptedRuntime::with_starts(&[false, false, false]));

        let result = controller.deploy(&web(3).into()).await;

        assert!(result.is_not_ok());
        assert_eq!(result.code(), ErrorCode::RunContainerFail);
        assert_eq!(result.status(), status::EXPECTATION_FAILED);
        assert_eq!(*result.value(), 0);
        assert_eq!(controller.pod_count().await, 0);
    }

    #[tokio::test]
    async fn test_deploy_unsupported_kind() {
        let controller = controller(ScriptedRuntime::default());
        let spec = Deployable::Unsupported {
            kind: "batch_job".to_string(),
        };

        let result = controller.deploy(&spec).await;

        assert_eq!(result.code(), ErrorCode::UnimplementedKeyVariant);
        assert_eq!(controller.pod_count().await, 0);
        assert!(controller.runtime().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replicas_get_distinct_host_ports() {
        let controller = controller(ScriptedRuntime::default());

        controller.deploy(&web(3).into()).await;

        let requests = controller.runtime().requests.lock().unwrap().clone();
        let mut ports: Vec<u16> = requests.iter().map(|r| r.host_port).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), 3);
        assert!(requests.iter().all(|r| r.container_port == 80 && r.auto_remove));
    }

    #[tokio::test]
    async fn test_gpu_request_dropped_when_disabled() {
        let controller = controller(ScriptedRuntime::default());

        controller.deploy(&web(1).with_gpu_count(-1).into()).await;

        let requests = controller.runtime().requests.lock().unwrap().clone();
        assert_eq!(requests[0].gpus, GpuRequest::None);
    }

    #[tokio::test]
    async fn test_gpu_request_forwarded_when_enabled() {
        let config = ControllerConfig {
            gpu_enabled: true,
            ..ControllerConfig::default()
        };
        let range = PortRange::new(43300, 43399).unwrap();
        let controller = PodController::new(ScriptedRuntime::default(), PortAllocator::new(range), config);

        controller.deploy(&web(1).with_gpu_count(2).into()).await;

        let requests = controller.runtime().requests.lock().unwrap().clone();
        assert_eq!(requests[0].gpus, GpuRequest::Count(2));
    }

    #[tokio::test]
    async fn test_stop_is_best_effort() {
        let controller = controller(ScriptedRuntime::default());
        let key = web(2).pod_key();
        controller.deploy(&web(2).into()).await;
        controller.runtime().script_stops(&[false, true]);

        let report = controller.stop(key, &CancellationToken::new()).await;

        assert_eq!(report.stopped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.attempted(), 2);
        let remaining = controller.pods(key).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].container().id().as_str(), "container-0");
    }

    #[tokio::test]
    async fn test_stop_only_touches_matching_key() {
        let controller = controller(ScriptedRuntime::default());
        let other = Service::new("/api", "/", "api:latest", 8080);
        controller.deploy(&web(1).into()).await;
        controller.deploy(&other.clone().into()).await;

        let report = controller.stop(web(1).pod_key(), &CancellationToken::new()).await;

        assert_eq!(report.stopped, 1);
        assert_eq!(controller.pods(other.pod_key()).await.len(), 1);
        assert_eq!(controller.pod_count().await, 1);
    }

    #[tokio::test]
    async fn test_cancelled_stop_keeps_pods() {
        let controller = controller(ScriptedRuntime::default());
        let key = web(2).pod_key();
        controller.deploy(&web(2).into()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = controller.stop(key, &cancel).await;

        assert_eq!(report.cancelled, 2);
        assert!(!report.is_complete());
        assert_eq!(controller.pods(key).await.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let controller = controller(ScriptedRuntime::default());
        controller.deploy(&web(2).into()).await;
        controller
            .deploy(&Service::new("/api", "/", "api:latest", 8080).into())
            .await;

        let report = controller.shutdown(&CancellationToken::new()).await;

        assert_eq!(report.stopped, 3);
        assert_eq!(controller.pod_count().await, 0);
    }

    #[tokio::test]
    async fn test_invoke_targets_live_pod() {
        let controller = controller(ScriptedRuntime::default());
        let key = web(1).pod_key();
        controller.deploy(&web(1).into()).await;
        let port = controller.ports().allocated(key.for_replica(0)).await.unwrap();

        let result = controller
            .invoke(key, "/api/generate", serde_json::json!({"prompt": "hi"}))
            .await;

        assert!(result.is_ok());
        assert_eq!(
            result.value().body["url"],
            format!("http://localhost:{}/api/generate", port)
        );
        assert_eq!(result.value().body["echo"]["prompt"], "hi");
    }

    #[tokio::test]
    async fn test_invoke_without_pods() {
        let controller = controller(ScriptedRuntime::default());

        let result = controller
            .invoke(web(1).pod_key(), "/", serde_json::Value::Null)
            .await;

        assert_eq!(result.code(), ErrorCode::GetContainerFail);
        assert_eq!(result.status(), status::NOT_FOUND);
    }
}
