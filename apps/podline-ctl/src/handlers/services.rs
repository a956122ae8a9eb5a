//! Service handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podline_domain::{Deployable, Keyed};
use tracing::{error, info, warn};

use super::{failure, not_found};
use crate::{
    dto::{
        services::{RemoveServiceResponse, ServiceResponse, SetServiceRequest, SetServiceResponse},
        ErrorResponse,
    },
    AppState,
};

/// Register a service and deploy it if its endpoint is new
#[utoipa::path(
    post,
    path = "/ctl/services/set",
    request_body = SetServiceRequest,
    responses(
        (status = 200, description = "Service registered", body = SetServiceResponse),
        (status = 417, description = "No replica could be started", body = ErrorResponse),
        (status = 422, description = "No free host port left", body = ErrorResponse),
        (status = 500, description = "Unsupported kind or runtime failure", body = ErrorResponse)
    ),
    tag = "services"
)]
pub async fn set_service_handler(
    State(state): State<AppState>,
    Json(payload): Json<SetServiceRequest>,
) -> Response {
    let deployable = payload.into_deployable();
    info!(kind = deployable.kind(), "Received set service request");

    let result = match deployable {
        Deployable::Service(service) => state.registry.set(service).await,
        unsupported => state
            .registry
            .controller()
            .deploy(&unsupported)
            .await
            .project_or(true, false),
    };

    if result.is_not_ok() {
        error!(code = %result.code(), message = %result.message(), "Failed to set service");
        return failure(&result);
    }

    let message = match result.message() {
        "" => "Service set".to_string(),
        message => message.to_string(),
    };
    (
        StatusCode::OK,
        Json(SetServiceResponse {
            deployed: *result.value(),
            message,
        }),
    )
        .into_response()
}

/// Unregister a service and stop its pods
#[utoipa::path(
    delete,
    path = "/ctl/services/{host_endpoint}",
    params(
        ("host_endpoint" = String, Path, description = "Host endpoint, percent-encoded")
    ),
    responses(
        (status = 200, description = "Service removed, pods stopped best-effort", body = RemoveServiceResponse),
        (status = 404, description = "Unknown endpoint", body = ErrorResponse)
    ),
    tag = "services"
)]
pub async fn remove_service_handler(
    State(state): State<AppState>,
    Path(host_endpoint): Path<String>,
) -> Response {
    info!(endpoint = %host_endpoint, "Received remove service request");

    match state
        .registry
        .remove(&host_endpoint, &state.cancel.child_token())
        .await
    {
        Some(report) => {
            if !report.is_complete() {
                warn!(endpoint = %host_endpoint, failed = report.failed, cancelled = report.cancelled, "Some pods are still running");
            }
            (StatusCode::OK, Json(RemoveServiceResponse::from(report))).into_response()
        }
        None => not_found(format!("Unknown service endpoint '{}'", host_endpoint)),
    }
}

/// List registered services
#[utoipa::path(
    get,
    path = "/ctl/services",
    responses(
        (status = 200, description = "Registered services ordered by endpoint", body = [ServiceResponse])
    ),
    tag = "services"
)]
pub async fn list_services_handler(State(state): State<AppState>) -> Json<Vec<ServiceResponse>> {
    let mut services = Vec::new();
    for service in state.registry.list().await {
        let key = service.pod_key();
        let pods = state.registry.controller().pods(key).await;
        services.push(ServiceResponse::new(service, key.to_string(), &pods));
    }
    Json(services)
}

/// Forward a JSON call to a running replica of a service
#[utoipa::path(
    post,
    path = "/ctl/services/{host_endpoint}/invoke/{path}",
    params(
        ("host_endpoint" = String, Path, description = "Host endpoint, percent-encoded"),
        ("path" = String, Path, description = "Path appended to the container endpoint")
    ),
    request_body(content = Object, description = "Payload forwarded as is"),
    responses(
        (status = 200, description = "Answer of the container", body = Object),
        (status = 404, description = "Unknown endpoint or no reachable pod", body = ErrorResponse),
        (status = 500, description = "Call could not be made", body = ErrorResponse)
    ),
    tag = "services"
)]
pub async fn invoke_service_handler(
    State(state): State<AppState>,
    Path((host_endpoint, path)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let Some(service) = state.registry.get(&host_endpoint).await else {
        return not_found(format!("Unknown service endpoint '{}'", host_endpoint));
    };

    let target = join_path(&service.container_endpoint, &path);
    info!(endpoint = %host_endpoint, target = %target, "Forwarding call");

    let result = state
        .registry
        .controller()
        .invoke(service.pod_key(), &target, payload)
        .await;

    // A container that answered gets its answer relayed, even an error one
    let answered = result.value().status;
    if result.is_not_ok() && answered == 0 {
        warn!(code = %result.code(), message = %result.message(), "Call failed");
        return failure(&result);
    }

    let status = StatusCode::from_u16(answered).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(result.into_value().body)).into_response()
}

fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::join_path;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/api", "generate"), "/api/generate");
        assert_eq!(join_path("/api/", "/generate"), "/api/generate");
        assert_eq!(join_path("/", "predict"), "/predict");
        assert_eq!(join_path("", "v1/chat"), "/v1/chat");
    }
}
