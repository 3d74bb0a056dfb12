//! Signup Service
//!
//! REST API for tenant signup; site creation runs as background tasks

use anyhow::{Context, Result};
use provisioner::{BenchSiteController, JobBoard, RegistryClient, SignupOrchestrator, SiteAccountClient};
use signup_service::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signup_service=debug,provisioner=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    info!("Starting Signup Service");
    info!("Bench path: {}", config.provisioning.bench_path.display());
    info!("Registry URL: {}", config.registry_url);
    if config.registry_credentials.is_empty() {
        warn!("REGISTRY_API_KEY/REGISTRY_API_SECRET not set");
    }
    if !config.provisioning.sites_dir().is_dir() {
        warn!(
            "Sites directory {} does not exist yet",
            config.provisioning.sites_dir().display()
        );
    }

    let provisioning = Arc::new(config.provisioning.clone());

    let registry = RegistryClient::new(
        config.registry_url.clone(),
        config.registry_credentials.clone(),
        config.http_timeout,
    )
    .context("Failed to build registry client")?;
    let accounts = SiteAccountClient::new(provisioning.clone(), config.http_timeout)
        .context("Failed to build site account client")?;
    let controller = BenchSiteController::new(provisioning.clone());

    let orchestrator = SignupOrchestrator::new(
        provisioning,
        Arc::new(controller),
        Arc::new(registry),
        Arc::new(accounts),
        JobBoard::new(),
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    let app = create_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Signup Service API running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
