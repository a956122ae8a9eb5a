//! API routes

pub mod containers;
pub mod services;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dto::{
        containers::ContainerResponse,
        services::{
            PodResponse, RemoveServiceResponse, ServiceResponse, SetServiceRequest,
            SetServiceResponse,
        },
        ErrorResponse,
    },
    handlers, AppState,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::services::set_service_handler,
        handlers::services::remove_service_handler,
        handlers::services::list_services_handler,
        handlers::services::invoke_service_handler,
        handlers::containers::find_container_handler,
        health_handler
    ),
    components(
        schemas(
            SetServiceRequest,
            SetServiceResponse,
            ServiceResponse,
            PodResponse,
            RemoveServiceResponse,
            ContainerResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "services", description = "Service lifecycle endpoints"),
        (name = "containers", description = "Container lookup endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Podline API",
        version = "0.1.0",
        description = "Control surface of the Podline on-host container controller",
        contact(
            name = "Podline Team"
        )
    )
)]
pub struct ApiDoc;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(services::routes())
        .merge(containers::routes())
        .route("/health", axum::routing::get(health_handler))
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    ),
    tag = "health"
)]
async fn health_handler() -> &'static str {
    "OK"
}
