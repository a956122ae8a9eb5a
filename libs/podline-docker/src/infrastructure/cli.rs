//! Docker CLI arguments and output parsing
//!
//! Pure helpers, kept apart from process handling so they can be tested
//! without a Docker daemon.

use podline_domain::engine::{GpuRequest, StartRequest};
use serde::Deserialize;

use crate::error::{DockerError, Result};

/// Format string for `docker ps`, one JSON object per line
pub const PS_FORMAT: &str = "{{json .}}";

/// Format string for `docker inspect`, space separated network addresses
pub const INSPECT_ADDRESS_FORMAT: &str = "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}";

/// Arguments of `docker run` for one replica
///
/// See <https://docs.docker.com/reference/cli/docker/container/run/>
pub fn run_args(request: &StartRequest) -> Vec<String> {
    let mut args = vec!["run".to_string(), "-d".to_string()];

    if request.auto_remove {
        args.push("--rm".to_string());
    }

    match request.gpus {
        GpuRequest::None => {}
        GpuRequest::All => args.push("--gpus=all".to_string()),
        GpuRequest::Count(count) => args.push(format!("--gpus={}", count)),
    }

    if !request.replica_name.is_empty() {
        args.push(format!("--name={}", request.replica_name));
    }

    if request.publishes_port() {
        args.push("-p".to_string());
        args.push(format!("{}:{}", request.host_port, request.container_port));
    }

    args.push(request.image.clone());
    args
}

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Clone, Deserialize)]
pub struct PsEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
    #[serde(rename = "Names", default)]
    pub names: String,
}

impl PsEntry {
    /// First host port published by the container
    pub fn published_port(&self) -> Option<u16> {
        published_port(&self.ports)
    }
}

/// Parse the output of `docker ps`, skipping blank lines
pub fn parse_ps(output: &str) -> Result<Vec<PsEntry>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| DockerError::parse(format!("docker ps line '{}': {}", line, e)))
        })
        .collect()
}

/// Host port of the first mapping in a `Ports` column
///
/// `"0.0.0.0:20001->80/tcp, :::20001->80/tcp"` gives `20001`. Exposed but
/// unpublished ports such as `"80/tcp"` give nothing.
pub fn published_port(ports: &str) -> Option<u16> {
    ports
        .split(',')
        .filter_map(|mapping| mapping.trim().split_once("->"))
        .find_map(|(host, _)| host.rsplit(':').next()?.parse().ok())
}

/// First address printed by `docker inspect` with [`INSPECT_ADDRESS_FORMAT`]
pub fn first_address(output: &str) -> Option<String> {
    output.split_whitespace().next().map(str::to_string)
}

/// Container id printed by `docker run -d`
pub fn container_id(output: &str) -> Result<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
        .ok_or_else(|| DockerError::parse("docker run printed no container id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StartRequest {
        StartRequest {
            image: "ollama/ollama".to_string(),
            replica_name: "podline-llama-0-1a2b3c4d".to_string(),
            gpus: GpuRequest::None,
            host_port: 20001,
            container_port: 11434,
            auto_remove: true,
        }
    }

    #[test]
    fn test_run_args_full() {
        let mut request = request();
        request.gpus = GpuRequest::All;

        assert_eq!(
            run_args(&request),
            vec![
                "run",
                "-d",
                "--rm",
                "--gpus=all",
                "--name=podline-llama-0-1a2b3c4d",
                "-p",
                "20001:11434",
                "ollama/ollama",
            ]
        );
    }

    #[test]
    fn test_run_args_minimal() {
        let request = StartRequest {
            image: "nginx".to_string(),
            ..StartRequest::default()
        };

        assert_eq!(run_args(&request), vec!["run", "-d", "nginx"]);
    }

    #[test]
    fn test_run_args_gpu_count() {
        let mut request = request();
        request.gpus = GpuRequest::Count(2);
        assert!(run_args(&request).contains(&"--gpus=2".to_string()));
    }

    #[test]
    fn test_parse_ps() {
        let output = r#"
{"ID":"aaa111","Image":"nginx:alpine","Ports":"0.0.0.0:20005->80/tcp, :::20005->80/tcp","Names":"web"}

{"ID":"bbb222","Image":"redis:7","Ports":"6379/tcp","Names":"cache"}
"#;
        let entries = parse_ps(output).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image, "nginx:alpine");
        assert_eq!(entries[0].published_port(), Some(20005));
        assert_eq!(entries[1].published_port(), None);
        assert_eq!(entries[1].names, "cache");
    }

    #[test]
    fn test_parse_ps_rejects_garbage() {
        assert!(matches!(parse_ps("not json"), Err(DockerError::Parse(_))));
    }

    #[test]
    fn test_published_port_ipv6_only() {
        assert_eq!(published_port(":::8080->8080/tcp"), Some(8080));
        assert_eq!(published_port(""), None);
    }

    #[test]
    fn test_container_id() {
        assert_eq!(container_id("abc123\n").unwrap(), "abc123");
        assert!(container_id("\n").is_err());
        assert_eq!(first_address("172.17.0.2 10.0.0.3 "), Some("172.17.0.2".to_string()));
        assert_eq!(first_address("  "), None);
    }
}
