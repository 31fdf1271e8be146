use std::{path::PathBuf, sync::Arc, time::SystemTime};

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sources::{Table, TableFormat},
};

/// Spreadsheet or CSV file on the local filesystem.
pub struct FileSource {
    path: PathBuf,
    format: TableFormat,
    sheet: Option<String>,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P, format: TableFormat, sheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            format,
            sheet,
        }
    }
}

#[async_trait::async_trait]
impl Source for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Envelope<Arc<Table>>, PipelineError> {
        metrics::counter!("tracker_source_fetch_total", "kind" => "file").increment(1);

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) => {
                metrics::counter!("tracker_source_fetch_errors_total", "kind" => "file").increment(1);
                tracing::error!(path = %self.path.display(), error = %e, "failed to read source file");
                return Err(PipelineError::SourceUnavailable(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let table = Table::parse(bytes, self.format, self.sheet.as_deref())?;
        tracing::debug!(path = %self.path.display(), rows = table.len(), "loaded file source");

        Ok(Envelope {
            payload: Arc::new(table),
            received_at: SystemTime::now(),
        })
    }
}
