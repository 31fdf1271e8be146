use askama::Template;

use crate::{
    pipeline::{PipelineError, Sink, Snapshot},
    sinks::installation_date_text,
};

pub struct ReportRow {
    pub site_id: String,
    pub status: &'static str,
    pub installation_date: String,
}

/// HTML document with the site status table, stand-in for a PDF report.
#[derive(Template)]
#[template(path = "installation_report.html")]
pub struct InstallationReport {
    pub rows: Vec<ReportRow>,
}

impl InstallationReport {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            rows: snapshot
                .records
                .iter()
                .map(|r| ReportRow {
                    site_id: r.site_id.clone(),
                    status: r.status.as_str(),
                    installation_date: installation_date_text(r),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HtmlReportSink;

impl Sink for HtmlReportSink {
    fn file_name(&self) -> &str {
        "installation_report.html"
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PipelineError> {
        InstallationReport::from_snapshot(snapshot)
            .render()
            .map(String::into_bytes)
            .map_err(|e| PipelineError::Export(format!("failed to render report: {e}")))
    }
}
