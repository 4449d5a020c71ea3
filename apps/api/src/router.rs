use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, PolicyError};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Result<Router, PolicyError> {
    Ok(Router::new()
        .route("/", get(|| async { "Clinic admission API is running!" }))
        .nest("/appointments", appointment_routes(state)?))
}
