//! Service routes

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::{
    handlers::services::{
        invoke_service_handler, list_services_handler, remove_service_handler,
        set_service_handler,
    },
    AppState,
};

/// Create service routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ctl/services", get(list_services_handler))
        .route("/ctl/services/set", post(set_service_handler))
        .route("/ctl/services/:host_endpoint", delete(remove_service_handler))
        .route(
            "/ctl/services/:host_endpoint/invoke/*path",
            post(invoke_service_handler),
        )
}
