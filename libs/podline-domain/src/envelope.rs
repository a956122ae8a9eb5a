//! Result envelope
//!
//! Every fallible step in Podline returns an [`Envelope`]: an HTTP-style
//! status, a domain [`ErrorCode`], a message and a value. An envelope is ok
//! only when the status is `200` and the code is [`ErrorCode::Ok`]; the value
//! of a not-ok envelope carries no meaning unless the producer documents one.
//!
//! Envelopes are never mutated. Every transformation consumes the envelope
//! and produces a new one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP status values used by the domain
pub mod status {
    pub const OK: u16 = 200;
    pub const NOT_FOUND: u16 = 404;
    pub const EXPECTATION_FAILED: u16 = 417;
    pub const UNPROCESSABLE_CONTENT: u16 = 422;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const GATEWAY_TIMEOUT: u16 = 504;
}

/// Domain error codes
///
/// The discriminants are the wire values reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[default]
    Ok = 0,
    RunContainerFail = 1,
    StopContainerFail = 2,
    PostContainerFail = 3,
    GetContainerFail = 4,
    UnimplementedKeyVariant = 102,
    AllPortsOccupied = 200,
    Unknown = -1,
}

impl ErrorCode {
    /// Numeric wire value
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::RunContainerFail => "RUN_CONTAINER_FAIL",
            Self::StopContainerFail => "STOP_CONTAINER_FAIL",
            Self::PostContainerFail => "POST_CONTAINER_FAIL",
            Self::GetContainerFail => "GET_CONTAINER_FAIL",
            Self::UnimplementedKeyVariant => "UNIMPLEMENTED_KEY_VARIANT",
            Self::AllPortsOccupied => "ALL_PORTS_OCCUPIED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

/// Uniform success/failure container
///
/// # Example
///
/// ```rust
/// use podline_domain::envelope::{status, Envelope, ErrorCode};
///
/// let port: Envelope<u16> = Envelope::ok(20001);
/// assert!(port.is_ok());
///
/// let failed: Envelope<u16> =
///     Envelope::not_ok(status::UNPROCESSABLE_CONTENT, ErrorCode::AllPortsOccupied, "full");
/// let count: Envelope<usize> = failed.project(0);
/// assert_eq!(count.code(), ErrorCode::AllPortsOccupied);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    status: u16,
    code: ErrorCode,
    message: String,
    value: T,
}

impl<T> Envelope<T> {
    /// Ok envelope around `value`
    pub fn ok(value: T) -> Self {
        Self::ok_with_message(value, "")
    }

    /// Ok envelope around `value` with a message
    pub fn ok_with_message(value: T, message: impl Into<String>) -> Self {
        Self {
            status: status::OK,
            code: ErrorCode::Ok,
            message: message.into(),
            value,
        }
    }

    /// Not-ok envelope that still carries a value
    ///
    /// Used when the producer has something useful to hand back on failure,
    /// such as the handle of a container that refused to stop.
    pub fn not_ok_with_value(
        status: u16,
        code: ErrorCode,
        message: impl Into<String>,
        value: T,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            value,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK && self.code == ErrorCode::Ok
    }

    pub fn is_not_ok(&self) -> bool {
        !self.is_ok()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Borrow the value. Only meaningful when [`is_ok`](Self::is_ok).
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Take the value. Only meaningful when [`is_ok`](Self::is_ok).
    pub fn into_value(self) -> T {
        self.value
    }

    /// Separate the status header from the value
    pub fn split(self) -> (Envelope<()>, T) {
        let header = Envelope {
            status: self.status,
            code: self.code,
            message: self.message,
            value: (),
        };
        (header, self.value)
    }

    /// Keep status, code and message, replace the value
    pub fn project<U>(self, value: U) -> Envelope<U> {
        Envelope {
            status: self.status,
            code: self.code,
            message: self.message,
            value,
        }
    }

    /// Keep status, code and message, pick the value by outcome
    pub fn project_or<U>(self, on_ok: U, on_not_ok: U) -> Envelope<U> {
        if self.is_ok() {
            self.project(on_ok)
        } else {
            self.project(on_not_ok)
        }
    }

    /// Transform the value regardless of outcome
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            status: self.status,
            code: self.code,
            message: self.message,
            value: f(self.value),
        }
    }
}

impl<T: Default> Envelope<T> {
    /// Not-ok envelope with an empty value
    pub fn not_ok(status: u16, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::not_ok_with_value(status, code, message, T::default())
    }

    /// Same failure as `self`, re-typed with an empty value
    pub fn failure_of<U>(other: &Envelope<U>) -> Self {
        Self::not_ok(other.status, other.code, other.message.clone())
    }

    /// Generic failure for faults nobody converted at their origin
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::not_ok(status::INTERNAL_SERVER_ERROR, ErrorCode::Unknown, message)
    }
}

impl<T> From<T> for Envelope<T> {
    fn from(value: T) -> Self {
        Self::ok(value)
    }
}
