use std::time::Duration;

use anyhow::Result;
use tracker_service::{config::AppConfig, dashboard, metrics_server, observability, pipeline::Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pipeline = Pipeline::from_config(&cfg)?.cached(Duration::from_secs(cfg.cache.ttl_secs));
    tracing::info!(
        registry = %cfg.registry.location,
        events = %cfg.events.location,
        cache_ttl_secs = cfg.cache.ttl_secs,
        "pipeline configured"
    );

    dashboard::serve(&cfg.dashboard.bind_addr, pipeline).await
}
