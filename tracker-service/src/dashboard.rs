//! HTTP host for the dashboard: JSON views, exports and manual refresh.

use std::{net::SocketAddr, sync::Arc};

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};
use tracker_client::{
    domain::{Kpis, SiteRecord, SiteStatus, TrendPoint},
    queries::{self, SiteFilter},
};

use crate::{
    pipeline::{DashboardPipeline, PipelineError, Sink, Snapshot},
    sinks::{installation_date_text, HtmlReportSink, XlsxSink},
};

#[derive(Clone)]
pub struct DashboardState {
    pipeline: Arc<DashboardPipeline>,
}

impl DashboardState {
    pub fn new(pipeline: DashboardPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Failure of a render cycle, shown to the user instead of the dashboard.
pub struct DashboardError(pub PipelineError);

#[derive(Serialize)]
struct ErrorView {
    state: &'static str,
    message: String,
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, state, message) = match &self.0 {
            PipelineError::SourceUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "unavailable",
                format!("Could not load data ({msg}). Check the source links and reload."),
            ),
            PipelineError::Schema(e) => (StatusCode::UNPROCESSABLE_ENTITY, "schema_error", e.to_string()),
            PipelineError::EmptyResult => (
                StatusCode::OK,
                "empty",
                "No data loaded. Please check the source links.".to_string(),
            ),
            PipelineError::Export(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "export_error", msg.clone()),
        };
        (status, Json(ErrorView { state, message })).into_response()
    }
}

impl From<PipelineError> for DashboardError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

fn bad_request(msg: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorView {
            state: "bad_request",
            message: msg,
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(
    source = "Site ID: {{ site_id }}<br>Status: {{ status }}<br>Installation Date: {{ installation_date }}",
    ext = "html"
)]
struct MarkerPopup<'a> {
    site_id: &'a str,
    status: &'a str,
    installation_date: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapMarker {
    pub site_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SiteStatus,
    pub color: &'static str,
    pub popup: String,
}

impl MapMarker {
    pub fn from_record(r: &SiteRecord) -> Self {
        let installation_date = installation_date_text(r);
        let popup = MarkerPopup {
            site_id: &r.site_id,
            status: r.status.as_str(),
            installation_date: &installation_date,
        }
        .render()
        .unwrap_or_else(|e| {
            tracing::warn!(site_id = %r.site_id, error = %e, "failed to render marker popup");
            String::new()
        });

        Self {
            site_id: r.site_id.clone(),
            latitude: r.latitude,
            longitude: r.longitude,
            status: r.status,
            color: match r.status {
                SiteStatus::Installed => "green",
                SiteStatus::Open => "red",
            },
            popup,
        }
    }
}

#[derive(Serialize)]
struct StatusCount {
    status: SiteStatus,
    count: usize,
}

#[derive(Serialize)]
struct DashboardView {
    state: &'static str,
    kpis: Kpis,
    distribution: Vec<StatusCount>,
    trend: Vec<TrendPoint>,
    markers: Vec<MapMarker>,
    fingerprint: String,
}

#[derive(Serialize)]
struct SitesView {
    state: &'static str,
    attribute_columns: Vec<String>,
    kpis: Kpis,
    records: Vec<SiteRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SitesQuery {
    pub region: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_day(field: &str, raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid {field} '{raw}', expected YYYY-MM-DD: {e}"))
}

impl SitesQuery {
    pub fn to_filter(&self) -> Result<SiteFilter, String> {
        let blank = |s: &Option<String>| s.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        Ok(SiteFilter {
            region: blank(&self.region),
            status: blank(&self.status)
                .map(|s| s.parse::<SiteStatus>())
                .transpose()
                .map_err(|e| e.to_string())?,
            from: blank(&self.from).map(|s| parse_day("from", &s)).transpose()?,
            to: blank(&self.to).map(|s| parse_day("to", &s)).transpose()?,
        })
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn dashboard_view(State(state): State<DashboardState>) -> Result<Json<DashboardView>, DashboardError> {
    let snap = state.pipeline.run().await?;
    Ok(Json(DashboardView {
        state: "ready",
        kpis: snap.kpis,
        distribution: queries::status_distribution(&snap.records)
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
        trend: queries::daily_trend(&snap.records),
        markers: snap.records.iter().map(MapMarker::from_record).collect(),
        fingerprint: snap.fingerprint,
    }))
}

async fn sites_view(State(state): State<DashboardState>, Query(q): Query<SitesQuery>) -> Response {
    let filter = match q.to_filter() {
        Ok(f) => f,
        Err(msg) => return bad_request(msg),
    };
    let snap = match state.pipeline.run().await {
        Ok(s) => s,
        Err(e) => return DashboardError(e).into_response(),
    };

    let records = queries::filter_sites(&snap.records, &filter);
    Json(SitesView {
        state: "ready",
        attribute_columns: snap.attribute_columns,
        kpis: queries::aggregate(&records),
        records,
    })
    .into_response()
}

fn download(sink: &dyn Sink, snap: &Snapshot) -> Result<Response, DashboardError> {
    let body = sink.render(snap)?;
    let disposition = format!("attachment; filename=\"{}\"", sink.file_name());

    let mut resp = body.into_response();
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sink.content_type()));
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    if let Ok(v) = HeaderValue::from_str(&format!("\"{}\"", snap.fingerprint)) {
        headers.insert(header::ETAG, v);
    }
    Ok(resp)
}

async fn export_xlsx(State(state): State<DashboardState>) -> Result<Response, DashboardError> {
    let snap = state.pipeline.run().await?;
    download(&XlsxSink, &snap)
}

async fn export_html(State(state): State<DashboardState>) -> Result<Response, DashboardError> {
    let snap = state.pipeline.run().await?;
    download(&HtmlReportSink, &snap)
}

async fn refresh(State(state): State<DashboardState>) -> StatusCode {
    state.pipeline.registry.invalidate().await;
    state.pipeline.events.invalidate().await;
    tracing::info!("source caches invalidated");
    StatusCode::NO_CONTENT
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/dashboard", get(dashboard_view))
        .route("/api/sites", get(sites_view))
        .route("/api/refresh", post(refresh))
        .route("/export/installation_status.xlsx", get(export_xlsx))
        .route("/export/installation_report.html", get(export_html))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind_addr: &str, pipeline: DashboardPipeline) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid dashboard.bind_addr '{bind_addr}': {e}"))?;

    let app = router(DashboardState::new(pipeline));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dashboard listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
