pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::detection::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Detection API
        .route("/api/v1/detect", post(handlers::handle_detect))
        .route("/api/v1/field-types", get(handlers::handle_field_types))
        .route(
            "/api/v1/site-overrides",
            get(handlers::handle_site_overrides),
        )
        .with_state(state)
}
