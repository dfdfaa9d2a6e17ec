//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dfscan_api::{create_router, metrics, ApiConfig, AppState};
use dfscan_detector::{CatalogConfig, ModelCatalog};
use dfscan_worker::{AnalysisService, JsonFileJobStore, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("dfscan=info".parse()?)
        .add_directive("ort=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting dfscan-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let catalog_config = CatalogConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!("Worker config: {:?}", worker_config);

    tokio::fs::create_dir_all(&worker_config.data_dir)
        .await
        .with_context(|| format!("failed to create {}", worker_config.data_dir.display()))?;

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let default_model = catalog_config.default_model.clone();
    let store = Arc::new(JsonFileJobStore::new(&worker_config.data_dir));
    let service = Arc::new(AnalysisService::new(
        worker_config,
        Arc::new(ModelCatalog::new(catalog_config)),
        store,
    ));

    let state = AppState::new(config.clone(), Arc::clone(&service), default_model);
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    service.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
