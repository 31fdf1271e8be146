use anyhow::{bail, Result};
use tracker_service::{
    config::AppConfig,
    observability,
    pipeline::{Pipeline, Sink},
    sinks::{HtmlReportSink, XlsxSink},
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: export_snapshot <xlsx_path> <html_path>");
    }
    let xlsx_path = &args[1];
    let html_path = &args[2];

    // Point TRACKER_CONFIG at the sources to export.
    let cfg = AppConfig::load()?;
    let pipeline = Pipeline::from_config(&cfg)?;

    let snapshot = pipeline.run().await?;

    tokio::fs::write(xlsx_path, XlsxSink.render(&snapshot)?).await?;
    tokio::fs::write(html_path, HtmlReportSink.render(&snapshot)?).await?;

    tracing::info!(
        total = snapshot.kpis.total,
        installed = snapshot.kpis.installed,
        progress_pct = snapshot.kpis.progress_pct,
        daily_rate = snapshot.kpis.daily_rate,
        xlsx = %xlsx_path,
        html = %html_path,
        "snapshot exported"
    );

    Ok(())
}
