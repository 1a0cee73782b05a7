//! Sentiment Server
//!
//! Serves `/predict/naive` and `/predict/trained` on the API port and
//! Prometheus metrics on the metrics port.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use sentiment_server::shutdown::Shutdown;
use sentiment_server::{create_router, metrics_router, spawn_metrics_upkeep, AppState, Cli, ServerConfig};
use sentiment_telemetry::{PredictionMetrics, UPKEEP_INTERVAL};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting sentiment server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Naive model: {}", config.models.naive);
    info!("Trained model: {}", config.models.trained);

    let shutdown = Shutdown::install();

    // Metrics come up first so startup is observable while models load
    let metrics = PredictionMetrics::new()?;
    let metrics_addr = config.metrics_addr()?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    info!("Metrics listening on http://{}/metrics", metrics_addr);
    let metrics_server = tokio::spawn({
        let app = metrics_router(metrics.clone());
        let shutdown = shutdown.clone();
        async move {
            axum::serve(metrics_listener, app)
                .with_graceful_shutdown(shutdown.wait())
                .await
        }
    });

    let upkeep = spawn_metrics_upkeep(metrics.clone(), UPKEEP_INTERVAL, shutdown.clone().wait());

    info!("Loading models...");
    let state = AppState::load(&config, metrics).await?;
    info!("Models loaded successfully");

    let addr = config.api_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown.wait())
        .await?;

    metrics_server.await??;
    upkeep.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("sentiment=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentiment=info,tower_http=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
