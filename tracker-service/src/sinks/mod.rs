pub mod html_report;
pub mod xlsx;

pub use html_report::HtmlReportSink;
pub use xlsx::XlsxSink;

use tracker_client::domain::SiteRecord;

use crate::sources::format_timestamp;

/// Text shown for the installation date column; blank for open or undated sites.
pub(crate) fn installation_date_text(record: &SiteRecord) -> String {
    record.installation_date.map(format_timestamp).unwrap_or_default()
}
