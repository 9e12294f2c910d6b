//! CustomerPulse — CRM audience segmentation and campaign analytics service.
//!
//! Main entry point that wires the store, segmentation and analytics
//! layers into the HTTP API server.

use clap::Parser;
use pulse_api::ApiServer;
use pulse_core::config::AppConfig;
use pulse_store::CrmStore;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "customer-pulse")]
#[command(about = "CRM audience segmentation and campaign analytics service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CUSTOMER_PULSE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CUSTOMER_PULSE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "CUSTOMER_PULSE__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Start with an empty store instead of the demo data set
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "customer_pulse=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("CustomerPulse starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_seed {
        config.store.seed_demo_data = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        seed = config.store.seed_demo_data,
        "Configuration loaded"
    );

    // Initialize the CRM store
    let store = Arc::new(CrmStore::new());
    if config.store.seed_demo_data {
        store.seed_demo_data()?;
        info!(
            customers = store.list_customers().len(),
            campaigns = store.list_campaigns().len(),
            "Demo data seeded"
        );
    }

    // Start API server
    let api_server = ApiServer::new(config.clone(), store);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("CustomerPulse is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
