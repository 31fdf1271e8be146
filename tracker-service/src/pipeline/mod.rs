use std::{sync::Arc, time::SystemTime};

use time::OffsetDateTime;
use tracker_client::{
    domain::{Kpis, SiteRecord},
    queries,
};

use crate::{
    config::AppConfig,
    schema::SchemaError,
    sources::{self, records, CachedSource, DynSource, Table},
    transform::{self, ReconcileOptions, ReconcileStats},
};

mod fingerprint;

pub use fingerprint::fingerprint_records;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("no sites with resolvable coordinates")]
    EmptyResult,
    #[error("export error: {0}")]
    Export(String),
}

/// A tabular dataset provider (file, URL, or a cache in front of either).
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Human-readable location, used in logs and error messages.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Envelope<Arc<Table>>, PipelineError>;
}

#[async_trait::async_trait]
impl<S: Source + ?Sized> Source for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn fetch(&self) -> Result<Envelope<Arc<Table>>, PipelineError> {
        (**self).fetch().await
    }
}

/// Renders a snapshot into a downloadable document.
pub trait Sink: Send + Sync {
    fn file_name(&self) -> &str;
    fn content_type(&self) -> &'static str;
    fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PipelineError>;
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub registry_key_hint: Option<String>,
    pub events_key_hint: Option<String>,
    pub reconcile: ReconcileOptions,
}

/// Output of one pipeline run. Rebuilt from the sources every time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<SiteRecord>,
    /// Registry columns carried through to the records, in header order.
    pub attribute_columns: Vec<String>,
    pub kpis: Kpis,
    pub stats: ReconcileStats,
    /// blake3 over the reconciled rows; equal inputs give equal fingerprints.
    pub fingerprint: String,
    pub built_at: OffsetDateTime,
}

pub struct Pipeline<R, E> {
    pub registry: R,
    pub events: E,
    pub options: PipelineOptions,
}

pub type DashboardPipeline = Pipeline<CachedSource<DynSource>, CachedSource<DynSource>>;

impl Pipeline<DynSource, DynSource> {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            registry: sources::from_config(&cfg.registry)?,
            events: sources::from_config(&cfg.events)?,
            options: PipelineOptions {
                registry_key_hint: cfg.registry.key_column_hint.clone(),
                events_key_hint: cfg.events.key_column_hint.clone(),
                reconcile: ReconcileOptions {
                    coordinate_fallback: cfg.reconcile.coordinate_fallback,
                },
            },
        })
    }

    /// Same pipeline with both sources behind a time-bounded cache.
    pub fn cached(self, ttl: std::time::Duration) -> DashboardPipeline {
        Pipeline {
            registry: CachedSource::new(self.registry, ttl),
            events: CachedSource::new(self.events, ttl),
            options: self.options,
        }
    }
}

impl<R, E> Pipeline<R, E>
where
    R: Source,
    E: Source,
{
    pub async fn run(&self) -> Result<Snapshot, PipelineError> {
        let (registry_env, events_env) = tokio::try_join!(self.registry.fetch(), self.events.fetch())?;

        let registry = records::registry_sites(
            &registry_env.payload,
            self.options.registry_key_hint.as_deref(),
            &self.registry.describe(),
        )?;
        let events = records::installation_events(
            &events_env.payload,
            self.options.events_key_hint.as_deref(),
            &self.events.describe(),
        )?;

        let reconciled = transform::reconcile(&registry.sites, &events, &self.options.reconcile);
        let stats = reconciled.stats;

        metrics::counter!("tracker_events_discarded_total").increment(stats.events_discarded as u64);
        metrics::counter!("tracker_rows_dropped_total").increment(stats.rows_dropped as u64);
        if stats.undated_installs > 0 {
            tracing::warn!(
                undated_installs = stats.undated_installs,
                "installed sites with unparseable installation timestamps"
            );
        }

        if reconciled.records.is_empty() {
            tracing::warn!(
                registry_rows = stats.registry_rows,
                rows_dropped = stats.rows_dropped,
                "no sites survived reconciliation"
            );
            return Err(PipelineError::EmptyResult);
        }

        let kpis = queries::aggregate(&reconciled.records);
        metrics::gauge!("tracker_sites_total").set(kpis.total as f64);
        metrics::gauge!("tracker_sites_installed").set(kpis.installed as f64);
        metrics::gauge!("tracker_progress_pct").set(kpis.progress_pct);

        let fingerprint = fingerprint_records(&reconciled.records);
        tracing::info!(
            total = kpis.total,
            installed = kpis.installed,
            open = kpis.open,
            events_discarded = stats.events_discarded,
            rows_dropped = stats.rows_dropped,
            fingerprint = %fingerprint,
            "snapshot built"
        );

        Ok(Snapshot {
            records: reconciled.records,
            attribute_columns: registry.attribute_columns,
            kpis,
            stats,
            fingerprint,
            built_at: OffsetDateTime::now_utc(),
        })
    }
}
