//! Prometheus exposition for the tracker's source and reconciliation metrics.

use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

fn describe_tracker_metrics() {
    describe_counter!("tracker_source_fetch_total", "Source fetches attempted, by kind");
    describe_counter!("tracker_source_fetch_errors_total", "Source fetches that failed, by kind");
    describe_counter!("tracker_source_cache_hits_total", "Fetches answered from the TTL cache");
    describe_counter!("tracker_events_discarded_total", "Installation events with no registry match");
    describe_counter!("tracker_rows_dropped_total", "Reconciled rows without usable coordinates");
    describe_gauge!("tracker_sites_total", "Sites in the last reconciled table");
    describe_gauge!("tracker_sites_installed", "Installed sites in the last reconciled table");
    describe_gauge!("tracker_progress_pct", Unit::Percent, "Installed share of all sites");
}

/// Install the recorder and expose `/metrics` on `bind_addr`.
///
/// Call once, from inside the Tokio runtime.
pub fn init(bind_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics.bind_addr '{bind_addr}': {e}"))?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("could not install metrics recorder: {e}"))?;
    if RECORDER.set(handle).is_err() {
        anyhow::bail!("metrics recorder already installed");
    }
    describe_tracker_metrics();

    let listener = std::net::TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    tracing::info!(%addr, "tracker metrics exposed at /metrics");

    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(scrape));
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            tracing::error!(error = %e, "metrics endpoint stopped");
        }
    });

    Ok(())
}

async fn scrape() -> String {
    RECORDER.get().map(PrometheusHandle::render).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_bind_addr_fails_before_installing_recorder() {
        let err = init("metrics.local").unwrap_err();
        assert!(err.to_string().contains("metrics.bind_addr"));
        assert!(RECORDER.get().is_none());
    }
}
