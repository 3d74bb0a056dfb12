//! Tenant Registry Service
//!
//! Authoritative list of tenants and the users who signed them up. The signup
//! service reads and writes it over a small document API; duplicate creates
//! are rejected with 409 so concurrent signups for one subdomain converge.

pub mod config;
pub mod handlers;
pub mod storage;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use storage::{MemoryStore, RedisStore, RegistryStore};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    let resources = Router::new()
        .route(
            "/api/resource/Tenant",
            get(handlers::list_tenants_handler).post(handlers::create_tenant_handler),
        )
        .route(
            "/api/resource/Tenant/{subdomain}",
            get(handlers::get_tenant_handler).delete(handlers::delete_tenant_handler),
        )
        .route("/api/resource/User", axum::routing::post(handlers::create_user_handler))
        .route("/api/resource/User/{email}", get(handlers::get_user_handler))
        .route_layer(middleware::from_fn_with_state(
            shared_state.clone(),
            handlers::require_token,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(resources)
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
