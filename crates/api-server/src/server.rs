//! API server — HTTP REST surface plus the Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use pulse_core::config::AppConfig;
use pulse_core::{CrmError, CrmResult};
use pulse_segmentation::RuleExtractor;
use pulse_store::CrmStore;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Assemble the full REST router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Segmentation and analytics
        .route("/api/v1/analytics", get(rest::get_analytics))
        .route("/api/v1/dashboard/stats", get(rest::get_dashboard_stats))
        .route("/api/v1/segments/generate-rules", post(rest::generate_rules))
        .route("/api/v1/segments/preview", post(rest::preview_segment))
        // Campaign lifecycle
        .route(
            "/api/v1/campaigns",
            get(rest::list_campaigns).post(rest::create_campaign),
        )
        .route(
            "/api/v1/campaigns/:id",
            get(rest::get_campaign)
                .put(rest::update_campaign)
                .delete(rest::delete_campaign),
        )
        .route("/api/v1/campaigns/:id/launch", post(rest::launch_campaign))
        .route(
            "/api/v1/campaigns/:id/complete",
            post(rest::complete_campaign),
        )
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server managing the REST and metrics endpoints.
pub struct ApiServer {
    config: AppConfig,
    store: Arc<CrmStore>,
}

impl ApiServer {
    pub fn new(config: AppConfig, store: Arc<CrmStore>) -> Self {
        Self { config, store }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> CrmResult<()> {
        let state = AppState {
            store: self.store.clone(),
            extractor: Arc::new(RuleExtractor::new()),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = build_router(state);
        let addr = SocketAddr::new(self.parse_host()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub async fn start_metrics(&self) -> CrmResult<()> {
        let addr = SocketAddr::new(self.parse_host()?, self.config.metrics.port);
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(anyhow::Error::from)?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }

    fn parse_host(&self) -> CrmResult<IpAddr> {
        self.config.api.host.parse().map_err(|e| {
            CrmError::Config(format!(
                "invalid API host '{}': {}",
                self.config.api.host, e
            ))
        })
    }
}
