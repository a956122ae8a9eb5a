//! Integration tests for the service registry
//!
//! These tests drive the registry end to end against an in-memory runtime:
//! 1. Setting a new endpoint deploys its replicas
//! 2. Setting a known endpoint only replaces the stored definition
//! 3. Removing an endpoint stops its pods, best-effort
//! 4. Shutdown stops everything still running

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use podline_domain::engine::{FindQuery, InvokeResponse, StartRequest};
use podline_domain::envelope::status;
use podline_domain::{
    ContainerHandle, ContainerRuntime, Envelope, ErrorCode, Keyed, PodController, PortAllocator,
    PortRange, Service, ServiceRegistry,
};
use tokio_util::sync::CancellationToken;

/// In-memory runtime that tracks running containers
#[derive(Default)]
struct InMemoryRuntime {
    running: Mutex<HashSet<String>>,
    failing_images: Mutex<HashSet<String>>,
    /// Starts allowed to succeed before every later one fails
    start_budget: Mutex<Option<usize>>,
    starts: AtomicUsize,
}

impl InMemoryRuntime {
    fn failing(image: &str) -> Self {
        let runtime = Self::default();
        runtime.failing_images.lock().unwrap().insert(image.to_string());
        runtime
    }

    fn with_start_budget(budget: usize) -> Self {
        let runtime = Self::default();
        *runtime.start_budget.lock().unwrap() = Some(budget);
        runtime
    }

    fn running(&self) -> usize {
        self.running.lock().unwrap().len()
    }
}

impl ContainerRuntime for InMemoryRuntime {
    fn start(&self, request: StartRequest) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let exhausted = match self.start_budget.lock().unwrap().as_mut() {
            Some(0) => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        };
        let result = if exhausted || self.failing_images.lock().unwrap().contains(&request.image) {
            Envelope::not_ok(
                status::INTERNAL_SERVER_ERROR,
                ErrorCode::RunContainerFail,
                "pull access denied",
            )
        } else {
            self.running.lock().unwrap().insert(request.replica_name.clone());
            Envelope::ok(
                ContainerHandle::new(request.replica_name)
                    .with_external_url(format!("http://localhost:{}", request.host_port)),
            )
        };
        async move { result }
    }

    fn stop(&self, handle: &ContainerHandle) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        self.running.lock().unwrap().remove(handle.id().as_str());
        let handle = handle.clone();
        async move { Envelope::ok(handle) }
    }

    fn find(&self, query: FindQuery) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        async move {
            Envelope::not_ok(
                status::NOT_FOUND,
                ErrorCode::GetContainerFail,
                format!("No container for {}", query.image),
            )
        }
    }

    fn invoke(
        &self,
        _handle: &ContainerHandle,
        _path: &str,
        _payload: serde_json::Value,
    ) -> impl Future<Output = Envelope<InvokeResponse>> + Send {
        async { Envelope::ok(InvokeResponse::default()) }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("podline_domain=debug")
        .with_test_writer()
        .try_init();
}

fn registry(runtime: InMemoryRuntime) -> ServiceRegistry<InMemoryRuntime> {
    init_tracing();
    let range = PortRange::new(44100, 44199).expect("valid range");
    let controller = PodController::with_runtime(runtime, PortAllocator::new(range));
    ServiceRegistry::new(Arc::new(controller))
}

fn web(replicas: u32) -> Service {
    Service::new("/web", "/", "nginx:alpine", 80).with_replicas(replicas)
}

#[tokio::test]
async fn test_set_new_endpoint_deploys() {
    let registry = registry(InMemoryRuntime::default());

    let result = registry.set(web(2)).await;

    assert!(result.is_ok());
    assert!(*result.value());
    assert_eq!(registry.controller().pods(web(2).pod_key()).await.len(), 2);
    assert_eq!(registry.controller().runtime().running(), 2);
    assert_eq!(registry.get("/web").await, Some(web(2)));
}

#[tokio::test]
async fn test_set_reports_partial_deploy() {
    let registry = registry(InMemoryRuntime::with_start_budget(1));

    let result = registry.set(web(3)).await;

    assert!(result.is_ok());
    assert!(*result.value());
    assert_eq!(result.message(), "Started 1 of 3 replicas");
    assert_eq!(registry.controller().pod_count().await, 1);
}

#[tokio::test]
async fn test_set_existing_endpoint_only_replaces_definition() {
    let registry = registry(InMemoryRuntime::default());
    registry.set(web(1)).await;

    let result = registry.set(web(4)).await;

    assert!(result.is_ok());
    assert!(result.message().contains("definition replaced"));
    assert!(*result.value());
    assert_eq!(registry.get("/web").await.map(|s| s.replicas), Some(4));
    assert_eq!(registry.controller().runtime().starts.load(Ordering::SeqCst), 1);
    assert_eq!(registry.controller().pod_count().await, 1);
}

#[tokio::test]
async fn test_set_reports_total_failure() {
    let registry = registry(InMemoryRuntime::failing("nginx:alpine"));

    let result = registry.set(web(3)).await;

    assert!(result.is_not_ok());
    assert!(!*result.value());
    assert_eq!(result.code(), ErrorCode::RunContainerFail);
    assert_eq!(registry.controller().runtime().starts.load(Ordering::SeqCst), 3);
    // The definition is kept so the endpoint can be removed later
    assert!(registry.get("/web").await.is_some());
}

#[tokio::test]
async fn test_remove_stops_pods() {
    let registry = registry(InMemoryRuntime::default());
    registry.set(web(3)).await;

    let report = registry
        .remove("/web", &CancellationToken::new())
        .await
        .expect("endpoint was registered");

    assert_eq!(report.stopped, 3);
    assert!(report.is_complete());
    assert_eq!(registry.controller().pod_count().await, 0);
    assert_eq!(registry.controller().runtime().running(), 0);
    assert!(registry.get("/web").await.is_none());
}

#[tokio::test]
async fn test_remove_unknown_endpoint() {
    let registry = registry(InMemoryRuntime::default());

    let report = registry.remove("/missing", &CancellationToken::new()).await;

    assert!(report.is_none());
}

#[tokio::test]
async fn test_redeploy_reuses_host_ports() {
    let registry = registry(InMemoryRuntime::default());
    let key = web(2).pod_key();

    registry.set(web(2)).await;
    let first: Vec<u16> = {
        let ports = registry.controller().ports();
        vec![
            ports.allocated(key.for_replica(0)).await.unwrap(),
            ports.allocated(key.for_replica(1)).await.unwrap(),
        ]
    };
    registry.remove("/web", &CancellationToken::new()).await;
    registry.set(web(2)).await;

    let ports = registry.controller().ports();
    assert_eq!(ports.allocated(key.for_replica(0)).await, Some(first[0]));
    assert_eq!(ports.allocated(key.for_replica(1)).await, Some(first[1]));
    assert_ne!(first[0], first[1]);
}

#[tokio::test]
async fn test_list_and_shutdown() {
    let registry = Arc::new(registry(InMemoryRuntime::default()));
    let api = Service::new("/api", "/v1", "api:latest", 8080).with_replicas(2);

    let (a, b) = tokio::join!(registry.set(web(1)), registry.set(api.clone()));
    assert!(a.is_ok() && b.is_ok());

    let endpoints: Vec<String> = registry
        .list()
        .await
        .into_iter()
        .map(|s| s.host_endpoint)
        .collect();
    assert_eq!(endpoints, vec!["/api".to_string(), "/web".to_string()]);

    let report = registry.shutdown(&CancellationToken::new()).await;
    assert_eq!(report.stopped, 3);
    assert_eq!(registry.controller().runtime().running(), 0);
}
