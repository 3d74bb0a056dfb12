//! Signup Service
//!
//! HTTP front for self-serve signup. A signup either lands the user on their
//! new site, signed in, or on a status page while the site is created in the
//! background.

pub mod config;
pub mod handlers;
pub mod models;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use models::SignupResponse;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/signup", post(handlers::signup_handler))
        .route("/api/signup/jobs/{job_id}", get(handlers::get_job_handler))
        .route(
            "/api/tenants/{subdomain}/status",
            get(handlers::tenant_status_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
