//! Error types for the Docker adapter
//!
//! These never leave the crate through the runtime port: they are turned into
//! envelopes with the domain code of the operation that failed.

use std::time::Duration;

use podline_domain::envelope::{status, ErrorCode};
use podline_domain::Envelope;
use thiserror::Error;

/// Result type alias for Docker operations
pub type Result<T> = std::result::Result<T, DockerError>;

/// Errors that can occur while driving the Docker CLI
#[derive(Error, Debug)]
pub enum DockerError {
    /// The docker binary could not be spawned
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited with a failure
    #[error("`{command}` exited with {}: {stderr}", .exit_code.map_or("a signal".to_string(), |c| format!("code {}", c)))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The command did not finish in time
    #[error("`{command}` timed out after {}ms", .timeout.as_millis())]
    Timeout { command: String, timeout: Duration },

    /// Output of the command could not be understood
    #[error("Unexpected docker output: {0}")]
    Parse(String),

    /// The container has no URL reachable from the host
    #[error("Container {0} has no host url")]
    NoHostUrl(String),

    /// HTTP call to a container failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DockerError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// HTTP-style status reported for this failure
    pub fn status(&self) -> u16 {
        match self {
            Self::Timeout { .. } => status::GATEWAY_TIMEOUT,
            _ => status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Not-ok envelope carrying this failure under `code`
    pub fn into_envelope<T: Default>(self, code: ErrorCode) -> Envelope<T> {
        Envelope::not_ok(self.status(), code, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let err = DockerError::CommandFailed {
            command: "docker stop abc".to_string(),
            exit_code: Some(1),
            stderr: "No such container: abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`docker stop abc` exited with code 1: No such container: abc"
        );
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = DockerError::Timeout {
            command: "docker run nginx".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));

        let envelope: Envelope<u16> = err.into_envelope(ErrorCode::RunContainerFail);
        assert_eq!(envelope.status(), status::GATEWAY_TIMEOUT);
        assert_eq!(envelope.code(), ErrorCode::RunContainerFail);
    }
}
