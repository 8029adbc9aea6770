use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber;

mod api;
mod config;
mod engine;
mod error;
mod models;
mod optimization;
mod services;
mod validation;

use config::{Config, Definitions};
use engine::StaticPipelineEngine;
use error::TracingSink;
use optimization::StrategyRegistry;
use services::{QueryExecutionFacade, ServiceCatalog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Load pipeline and service definitions
    let definitions = Definitions::from_file(&config.services.definitions_path).map_err(|e| {
        error!(
            "Failed to load definitions from {}: {}",
            config.services.definitions_path, e
        );
        e
    })?;
    info!(
        "Loaded {} pipeline(s) and {} service definition(s)",
        definitions.pipelines.len(),
        definitions.services.len()
    );

    // Wire the catalog and facade
    let engine = Arc::new(StaticPipelineEngine::from_definitions(definitions.pipelines));
    let registry = Arc::new(StrategyRegistry::with_defaults());
    let sink = Arc::new(TracingSink);
    let catalog = Arc::new(ServiceCatalog::new(
        engine.clone(),
        registry.clone(),
        sink.clone(),
    ));

    for service in definitions.services {
        let name = service.name.clone();
        catalog.register(service).await.map_err(|e| {
            error!("Failed to register data service {}: {}", name, e);
            e
        })?;
    }

    let facade = Arc::new(QueryExecutionFacade::new(
        catalog, engine, registry, sink,
    ));

    // Create router with state
    let app: Router = api::routes::create_router_with_state(facade);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
