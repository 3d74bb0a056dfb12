//! Tenant Registry Service
//!
//! REST API for tenant and signup-user documents

use anyhow::{Context, Result};
use std::sync::Arc;
use tenant_registry::{create_router, AppState, Config, RedisStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenant_registry=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    info!("Starting Tenant Registry Service");
    info!("Redis URL: {}", config.redis_url);
    if config.api_token.is_none() {
        warn!("REGISTRY_API_KEY not set, resource endpoints are unauthenticated");
    }

    let store = RedisStore::new(&config.redis_url)
        .await
        .context("Failed to initialize storage")?;

    let state = AppState {
        store: Arc::new(store),
        api_token: config.api_token.clone(),
    };

    let app = create_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Tenant Registry Service running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
