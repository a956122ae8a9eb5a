//! Request and response bodies of the control surface

pub mod containers;
pub mod services;

use podline_domain::Envelope;
use serde::Serialize;
use utoipa::ToSchema;

/// Error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error description
    #[schema(example = "No container started out of 2 replicas")]
    pub error: String,
    /// Domain error code, 0 when the failure is not a domain one
    #[schema(example = 1)]
    pub code: i32,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: 0,
        }
    }
}

impl<T> From<&Envelope<T>> for ErrorResponse {
    fn from(envelope: &Envelope<T>) -> Self {
        Self {
            error: envelope.message().to_string(),
            code: envelope.code().as_i32(),
        }
    }
}
