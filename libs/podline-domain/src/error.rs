//! Domain errors outside the envelope world
//!
//! Request-level failures travel inside [`Envelope`](crate::Envelope)s. The
//! errors here cover invalid configuration handed to the domain.

use thiserror::Error;

/// Errors raised by the domain layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The port scan range is empty or starts at port 0
    #[error("Invalid port range {min}..={max}")]
    InvalidPortRange { min: u16, max: u16 },
}

impl DomainError {
    /// Create an invalid port range error
    pub fn invalid_port_range(min: u16, max: u16) -> Self {
        Self::InvalidPortRange { min, max }
    }
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
