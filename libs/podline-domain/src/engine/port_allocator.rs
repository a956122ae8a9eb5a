//! Host port allocation
//!
//! Free ports are found by binding a loopback listener and releasing it right
//! away. That only says the port was free when checked: the runtime binds it
//! later and may lose a race against another process.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::ids::PodKey;
use crate::envelope::{status, Envelope, ErrorCode};
use crate::error::{DomainError, Result};

/// Inclusive range of host ports the allocator may hand out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min == 0 || min > max {
            return Err(DomainError::invalid_port_range(min, max));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.min..=self.max
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            min: 20000,
            max: 20999,
        }
    }
}

/// Whether a loopback listener can bind `port` right now
fn can_bind(port: u16) -> bool {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(err) => {
            debug!(port, error = %err, "Port not bindable");
            false
        }
    }
}

fn scan(range: PortRange, skip: &HashSet<u16>) -> Envelope<u16> {
    match range.ports().filter(|p| !skip.contains(p)).find(|p| can_bind(*p)) {
        Some(port) => Envelope::ok(port),
        None => {
            warn!(min = range.min(), max = range.max(), "All ports occupied");
            Envelope::not_ok(
                status::UNPROCESSABLE_CONTENT,
                ErrorCode::AllPortsOccupied,
                format!("All ports in {}..={} are occupied", range.min(), range.max()),
            )
        }
    }
}

/// First port in `range` that can be bound, scanning upwards
///
/// Blocks while probing.
pub fn find_free_port(range: PortRange) -> Envelope<u16> {
    scan(range, &HashSet::new())
}

/// Remembers which host port was given to which key
///
/// A key keeps its port for the whole process lifetime, so deploying the same
/// identity again asks the runtime for the same host port.
#[derive(Debug)]
pub struct PortAllocator {
    range: PortRange,
    ports: Mutex<HashMap<PodKey, u16>>,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            ports: Mutex::new(HashMap::new()),
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Port for `key`, finding a new one on first use
    ///
    /// Lookup, bind check and insert happen under one lock: two callers with the
    /// same key always get the same port, and ports cached for other keys are
    /// never checked again. The bind checks run on the blocking pool.
    pub async fn allocate(&self, key: PodKey) -> Envelope<u16> {
        let mut ports = self.ports.lock().await;
        if let Some(port) = ports.get(&key) {
            debug!(key = %key, port, "Reusing allocated port");
            return Envelope::ok(*port);
        }

        let taken: HashSet<u16> = ports.values().copied().collect();
        let range = self.range;
        let found = match tokio::task::spawn_blocking(move || scan(range, &taken)).await {
            Ok(found) => found,
            Err(err) => Envelope::unknown(format!("Port scan did not complete: {}", err)),
        };
        if found.is_ok() {
            let port = *found.value();
            ports.insert(key, port);
            info!(key = %key, port, "Allocated host port");
        }
        found
    }

    /// Port already given to `key`, if any
    pub async fn allocated(&self, key: PodKey) -> Option<u16> {
        self.ports.lock().await.get(&key).copied()
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(PortRange::default())
    }
}
