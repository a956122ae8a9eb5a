//! HTTP handlers

pub mod containers;
pub mod services;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podline_domain::Envelope;

use crate::dto::ErrorResponse;

/// HTTP status carried by an envelope
pub(crate) fn status_of<T>(envelope: &Envelope<T>) -> StatusCode {
    StatusCode::from_u16(envelope.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Error response for a not-ok envelope
pub(crate) fn failure<T>(envelope: &Envelope<T>) -> Response {
    (status_of(envelope), Json(ErrorResponse::from(envelope))).into_response()
}

pub(crate) fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
}
