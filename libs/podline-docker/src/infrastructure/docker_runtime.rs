//! Docker CLI Runtime Implementation
//!
//! This module implements the `ContainerRuntime` port by running the `docker`
//! binary. Container calls made through `invoke` go over HTTP with reqwest.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use podline_domain::{
    engine::{ContainerHandle, FindQuery, InvokeResponse, StartRequest},
    envelope::{status, ErrorCode},
    ContainerRuntime, Envelope,
};
use tokio::process::Command;
use tracing::{debug, error, info, instrument, warn};

use super::cli;
use crate::error::{DockerError, Result};

/// Configuration for the Docker CLI runtime
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path or name of the docker binary
    pub binary: String,
    /// Upper bound for a single CLI call (default: 60s)
    pub command_timeout: Duration,
    /// Upper bound for an `invoke` HTTP call (default: 300s)
    pub http_timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            command_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(300),
        }
    }
}

fn host_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// Docker-backed implementation of the ContainerRuntime port
///
/// Every call spawns the configured docker binary and waits for it, bounded
/// by `command_timeout`. A call that times out is killed.
///
/// ## Error Handling
///
/// Spawn failures, non-zero exits, timeouts and unreadable output are turned
/// into not-ok envelopes with the domain code of the operation.
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    config: DockerConfig,
    http: reqwest::Client,
}

impl DockerCliRuntime {
    /// Create a new Docker CLI runtime
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use podline_docker::infrastructure::{DockerCliRuntime, DockerConfig};
    ///
    /// # async fn example() -> podline_docker::Result<()> {
    /// let runtime = DockerCliRuntime::new(DockerConfig::default())?;
    /// let version = runtime.ping().await?;
    /// println!("Docker {}", version);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: DockerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        info!(binary = %config.binary, "Initializing DockerCliRuntime");
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    /// Server version reported by the daemon
    ///
    /// Fails when the binary is missing or the daemon is unreachable.
    pub async fn ping(&self) -> Result<String> {
        let output = self
            .docker(&["version", "--format", "{{.Server.Version}}"])
            .await?;
        Ok(output.trim().to_string())
    }

    async fn docker<S>(&self, args: &[S]) -> Result<String>
    where
        S: AsRef<str> + Sync,
    {
        let command = std::iter::once(self.config.binary.as_str())
            .chain(args.iter().map(AsRef::as_ref))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %command, "Running docker command");

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(DockerError::Spawn { command, source }),
            Err(_) => {
                return Err(DockerError::Timeout {
                    command,
                    timeout: self.config.command_timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn internal_address(&self, id: &str) -> Option<String> {
        match self
            .docker(&["inspect", "--format", cli::INSPECT_ADDRESS_FORMAT, id])
            .await
        {
            Ok(output) => cli::first_address(&output),
            Err(err) => {
                warn!(container = %id, error = %err, "Failed to inspect container address");
                None
            }
        }
    }

    #[instrument(skip(self, request), fields(image = %request.image, host_port = request.host_port))]
    async fn start_container(&self, request: StartRequest) -> Envelope<ContainerHandle> {
        let args = cli::run_args(&request);
        let id = match self
            .docker(&args)
            .await
            .and_then(|output| cli::container_id(&output))
        {
            Ok(id) => id,
            Err(err) => {
                error!(image = %request.image, error = %err, "Failed to run container");
                return err.into_envelope(ErrorCode::RunContainerFail);
            }
        };

        let mut handle = ContainerHandle::new(id.clone());
        if let Some(address) = self.internal_address(&id).await {
            handle = handle.with_internal_address(address);
        }
        if request.publishes_port() {
            handle = handle.with_external_url(host_url(request.host_port));
        }

        info!(container = %handle.id().short(), image = %request.image, "Container created and started");
        Envelope::ok_with_message(handle, "Container created and started successfully.")
    }

    #[instrument(skip(self, handle), fields(container = %handle.id().short()))]
    async fn stop_container(&self, handle: ContainerHandle) -> Envelope<ContainerHandle> {
        match self.docker(&["stop", handle.id().as_str()]).await {
            Ok(_) => {
                info!(container = %handle.id().short(), "Container stopped");
                Envelope::ok(handle)
            }
            Err(err) => {
                error!(container = %handle.id().short(), error = %err, "Failed to stop container");
                Envelope::not_ok_with_value(
                    err.status(),
                    ErrorCode::StopContainerFail,
                    err.to_string(),
                    handle,
                )
            }
        }
    }

    #[instrument(skip(self, query), fields(image = %query.image))]
    async fn find_container(&self, query: FindQuery) -> Envelope<ContainerHandle> {
        let entries = match self
            .docker(&["ps", "-a", "--no-trunc", "--format", cli::PS_FORMAT])
            .await
            .and_then(|output| cli::parse_ps(&output))
        {
            Ok(entries) => entries,
            Err(err) => {
                error!(image = %query.image, error = %err, "Failed to list containers");
                return err.into_envelope(ErrorCode::GetContainerFail);
            }
        };

        let Some(entry) = entries.into_iter().find(|entry| entry.image == query.image) else {
            debug!(image = %query.image, "No matching container");
            return Envelope::not_ok(
                status::NOT_FOUND,
                ErrorCode::GetContainerFail,
                "No matching container found.",
            );
        };

        debug!(container = %entry.id, names = %entry.names, "Found container");

        let mut handle = ContainerHandle::new(entry.id.clone());
        if let Some(address) = self.internal_address(&entry.id).await {
            handle = handle.with_internal_address(address);
        }
        if let Some(port) = entry.published_port() {
            handle = handle.with_external_url(host_url(port));
        }

        Envelope::ok_with_message(handle, "Container found.")
    }

    #[instrument(skip(self, handle, payload), fields(container = %handle.id().short()))]
    async fn invoke_container(
        &self,
        handle: ContainerHandle,
        path: String,
        payload: serde_json::Value,
    ) -> Envelope<InvokeResponse> {
        let Some(base) = handle.external_url() else {
            return DockerError::NoHostUrl(handle.id().to_string())
                .into_envelope(ErrorCode::PostContainerFail);
        };

        let url = if path.starts_with('/') || path.is_empty() {
            format!("{}{}", base.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", base.trim_end_matches('/'), path)
        };
        debug!(url = %url, "Posting to container");

        let response = match self.http.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %url, error = %err, "Container call failed");
                return DockerError::from(err).into_envelope(ErrorCode::PostContainerFail);
            }
        };

        let http_status = response.status();
        let reason = http_status.canonical_reason().unwrap_or_default().to_string();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return DockerError::from(err).into_envelope(ErrorCode::PostContainerFail);
            }
        };
        let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
        });
        let answer = InvokeResponse {
            status: http_status.as_u16(),
            body,
        };

        if http_status.is_success() {
            Envelope::ok_with_message(answer, reason)
        } else {
            warn!(url = %url, status = http_status.as_u16(), "Container answered with an error");
            Envelope::not_ok_with_value(
                http_status.as_u16(),
                ErrorCode::PostContainerFail,
                reason,
                answer,
            )
        }
    }
}

impl ContainerRuntime for DockerCliRuntime {
    fn start(&self, request: StartRequest) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        let runtime = self.clone();
        async move { runtime.start_container(request).await }
    }

    fn stop(&self, handle: &ContainerHandle) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        let runtime = self.clone();
        let handle = handle.clone();
        async move { runtime.stop_container(handle).await }
    }

    fn find(&self, query: FindQuery) -> impl Future<Output = Envelope<ContainerHandle>> + Send {
        let runtime = self.clone();
        async move { runtime.find_container(query).await }
    }

    fn invoke(
        &self,
        handle: &ContainerHandle,
        path: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = Envelope<InvokeResponse>> + Send {
        let runtime = self.clone();
        let handle = handle.clone();
        let path = path.to_string();
        async move { runtime.invoke_container(handle, path, payload).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DockerConfig::default();
        assert_eq!(config.binary, "docker");
        assert_eq!(config.command_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_host_url() {
        assert_eq!(host_url(20001), "http://localhost:20001");
    }
}
