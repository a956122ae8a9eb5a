//! Ports (trait definitions) for external dependencies
//!
//! The controller never talks to Docker directly. It needs a container
//! runtime able to start, stop, find and call containers, and adapters
//! provide one.
//!
//! ## Static Dispatch
//!
//! Native async traits with `impl Future` return types, so every controller is
//! monomorphized over its runtime without trait objects.

use std::future::Future;

use crate::engine::{ContainerHandle, FindQuery, InvokeResponse, StartRequest};
use crate::envelope::Envelope;

/// Port for container runtime operations
///
/// Implementations must turn every infrastructure failure into a not-ok
/// envelope with the matching [`ErrorCode`](crate::envelope::ErrorCode);
/// nothing may panic or escape as a raw error. Timeouts are the
/// implementation's business.
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container
    ///
    /// # Errors
    ///
    /// `RunContainerFail` when the container could not be created or started
    fn start(
        &self,
        request: StartRequest,
    ) -> impl Future<Output = Envelope<ContainerHandle>> + Send;

    /// Stop a running container
    ///
    /// The handle is echoed back on failure too.
    ///
    /// # Errors
    ///
    /// `StopContainerFail` when the runtime refused or failed to stop it
    fn stop(
        &self,
        handle: &ContainerHandle,
    ) -> impl Future<Output = Envelope<ContainerHandle>> + Send;

    /// Find an existing container by image
    ///
    /// # Errors
    ///
    /// `GetContainerFail` with status 404 when nothing matches, status 500
    /// when the lookup itself failed
    fn find(&self, query: FindQuery) -> impl Future<Output = Envelope<ContainerHandle>> + Send;

    /// POST a JSON payload to `path` on a container's external URL
    ///
    /// A success answer gives an ok envelope (status 200) whatever its 2xx
    /// code; the code the container answered with is kept in
    /// [`InvokeResponse::status`](crate::engine::InvokeResponse). An error
    /// answer gives a not-ok envelope carrying that status and the body.
    ///
    /// # Errors
    ///
    /// `PostContainerFail` on transport errors and non-success answers
    fn invoke(
        &self,
        handle: &ContainerHandle,
        path: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = Envelope<InvokeResponse>> + Send;
}
