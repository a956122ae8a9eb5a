//! Container lookup handler

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podline_domain::{engine::FindQuery, ContainerRuntime};
use tracing::{info, warn};

use super::failure;
use crate::{
    dto::{
        containers::{ContainerQuery, ContainerResponse},
        ErrorResponse,
    },
    AppState,
};

/// Find a container by image
#[utoipa::path(
    get,
    path = "/ctl/containers",
    params(ContainerQuery),
    responses(
        (status = 200, description = "First container running the image", body = ContainerResponse),
        (status = 404, description = "No container runs the image", body = ErrorResponse),
        (status = 500, description = "Runtime failure", body = ErrorResponse),
        (status = 504, description = "Runtime timed out", body = ErrorResponse)
    ),
    tag = "containers"
)]
pub async fn find_container_handler(
    State(state): State<AppState>,
    Query(query): Query<ContainerQuery>,
) -> Response {
    info!(image = %query.image, "Received container lookup");

    let result = state
        .registry
        .controller()
        .runtime()
        .find(FindQuery::by_image(query.image))
        .await;

    if result.is_not_ok() {
        warn!(code = %result.code(), message = %result.message(), "Container lookup failed");
        return failure(&result);
    }

    (StatusCode::OK, Json(ContainerResponse::from(result.value()))).into_response()
}
