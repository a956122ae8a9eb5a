//! Container routes

use axum::{routing::get, Router};

use crate::{handlers::containers::find_container_handler, AppState};

/// Create container routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ctl/containers", get(find_container_handler))
}
