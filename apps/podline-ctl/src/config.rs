//! Process settings read from the environment

use std::time::Duration;

use anyhow::{bail, Context, Result};
use podline_domain::PortRange;

/// Settings of the controller process
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Host ports handed to replicas
    pub port_range: PortRange,
    pub gpu_enabled: bool,
    pub docker_binary: String,
    pub docker_timeout: Duration,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Settings {
    /// Read settings from the process environment
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `PODLINE_HOST` | `0.0.0.0` |
    /// | `PODLINE_PORT` | `3000` |
    /// | `PODLINE_PORT_MIN` | `20000` |
    /// | `PODLINE_PORT_MAX` | `20999` |
    /// | `PODLINE_GPU_ENABLED` | `false` |
    /// | `PODLINE_DOCKER_BIN` | `docker` |
    /// | `PODLINE_DOCKER_TIMEOUT_SECS` | `60` |
    /// | `PODLINE_LOG_JSON` | `false` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| -> String {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port_min = parse_number::<u16>("PODLINE_PORT_MIN", &var("PODLINE_PORT_MIN", "20000"))?;
        let port_max = parse_number::<u16>("PODLINE_PORT_MAX", &var("PODLINE_PORT_MAX", "20999"))?;
        let port_range = PortRange::new(port_min, port_max)
            .context("PODLINE_PORT_MIN and PODLINE_PORT_MAX do not form a valid range")?;

        let timeout_secs = parse_number::<u64>(
            "PODLINE_DOCKER_TIMEOUT_SECS",
            &var("PODLINE_DOCKER_TIMEOUT_SECS", "60"),
        )?;
        if timeout_secs == 0 {
            bail!("PODLINE_DOCKER_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            host: var("PODLINE_HOST", "0.0.0.0"),
            port: parse_number("PODLINE_PORT", &var("PODLINE_PORT", "3000"))?,
            port_range,
            gpu_enabled: parse_flag("PODLINE_GPU_ENABLED", &var("PODLINE_GPU_ENABLED", "false"))?,
            docker_binary: var("PODLINE_DOCKER_BIN", "docker"),
            docker_timeout: Duration::from_secs(timeout_secs),
            log_json: parse_flag("PODLINE_LOG_JSON", &var("PODLINE_LOG_JSON", "false"))?,
        })
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("{} must be a number, got '{}'", name, raw))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{} must be true or false, got '{}'", name, raw),
    }
}
