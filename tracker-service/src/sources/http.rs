use std::{sync::Arc, time::{Duration, SystemTime}};

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sources::{Table, TableFormat},
};

/// Rewrite a Google Sheets editor link into its CSV export link.
///
/// `.../spreadsheets/d/<id>/edit?gid=7#gid=7` becomes
/// `.../spreadsheets/d/<id>/export?format=csv&gid=7`. Anything else,
/// including links that already point at `/export`, is returned unchanged.
pub fn export_url(url: &str) -> String {
    const MARKER: &str = "/spreadsheets/d/";

    let Some(start) = url.find(MARKER) else {
        return url.to_string();
    };
    let after = &url[start + MARKER.len()..];
    let id_end = after.find(['/', '?', '#']).unwrap_or(after.len());
    let (id, rest) = after.split_at(id_end);
    if !rest.starts_with("/edit") {
        return url.to_string();
    }

    let gid = rest
        .split(['?', '#', '&'])
        .find_map(|part| part.strip_prefix("gid="))
        .filter(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));

    let mut out = format!("{}{MARKER}{id}/export?format=csv", &url[..start]);
    if let Some(gid) = gid {
        out.push_str("&gid=");
        out.push_str(gid);
    }
    out
}

/// Tabular data behind an HTTP(S) link (raw file hosting, sheet exports).
pub struct HttpSource {
    url: String,
    format: TableFormat,
    sheet: Option<String>,
    auth_bearer_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(
        url: &str,
        format: TableFormat,
        sheet: Option<String>,
        auth_bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::SourceUnavailable(format!("failed to build HTTP client: {e}")))?;

        let resolved = export_url(url.trim());
        if resolved != url.trim() {
            tracing::info!(from = %url, to = %resolved, "rewrote sheet editor link to export link");
        }

        Ok(Self {
            url: resolved,
            format,
            sheet,
            auth_bearer_token,
            client,
        })
    }

    async fn download(&self) -> Result<Vec<u8>, PipelineError> {
        let mut req = self.client.get(&self.url);
        if let Some(token) = &self.auth_bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::SourceUnavailable(format!("GET {} failed: {e}", self.url)))?;

        let body = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("reading body of {} failed: {e}", self.url)))?;

        Ok(body.to_vec())
    }
}

#[async_trait::async_trait]
impl Source for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Envelope<Arc<Table>>, PipelineError> {
        metrics::counter!("tracker_source_fetch_total", "kind" => "url").increment(1);

        let bytes = match self.download().await {
            Ok(b) => b,
            Err(e) => {
                metrics::counter!("tracker_source_fetch_errors_total", "kind" => "url").increment(1);
                tracing::error!(url = %self.url, error = %e, "failed to fetch source");
                return Err(e);
            }
        };

        let table = Table::parse(bytes, self.format, self.sheet.as_deref())?;
        tracing::debug!(url = %self.url, rows = table.len(), "loaded url source");

        Ok(Envelope {
            payload: Arc::new(table),
            received_at: SystemTime::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_link_becomes_csv_export() {
        let url = "https://docs.google.com/spreadsheets/d/1GClN4fCfP8a/edit?gid=1294784605#gid=1294784605";
        assert_eq!(
            export_url(url),
            "https://docs.google.com/spreadsheets/d/1GClN4fCfP8a/export?format=csv&gid=1294784605"
        );
    }

    #[test]
    fn editor_link_without_gid_exports_first_sheet() {
        let url = "https://docs.google.com/spreadsheets/d/abc123/edit";
        assert_eq!(
            export_url(url),
            "https://docs.google.com/spreadsheets/d/abc123/export?format=csv"
        );
    }

    #[test]
    fn export_and_other_links_are_untouched() {
        let export = "https://docs.google.com/spreadsheets/d/abc/export?format=csv&gid=622694975";
        assert_eq!(export_url(export), export);

        let raw = "https://raw.githubusercontent.com/org/repo/main/progress.xlsx";
        assert_eq!(export_url(raw), raw);
    }

    #[tokio::test]
    async fn unreachable_host_is_source_unavailable() {
        let source = HttpSource::new(
            "http://127.0.0.1:9/sites.csv",
            TableFormat::Csv,
            None,
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        let res = source.fetch().await;
        assert!(matches!(res, Err(PipelineError::SourceUnavailable(_))));
    }

    /// Serves `/sites.csv` only to `Bearer sheet-token`; everything else is 401.
    async fn spawn_sheet_host() -> String {
        use axum::{http::HeaderMap, http::StatusCode, routing::get, Router};

        async fn sites(headers: HeaderMap) -> Result<&'static str, StatusCode> {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer sheet-token") => Ok("Site ID,Latitude,Longitude\nRIY0001,24.1,46.2\n"),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/sites.csv", get(sites));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });
        format!("http://{addr}/sites.csv")
    }

    fn source(url: &str, token: Option<&str>) -> HttpSource {
        HttpSource::new(
            url,
            TableFormat::Csv,
            None,
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let url = spawn_sheet_host().await;
        let env = source(&url, Some("sheet-token")).fetch().await.unwrap();
        assert_eq!(env.payload.headers, vec!["Site ID", "Latitude", "Longitude"]);
        assert_eq!(env.payload.len(), 1);
    }

    #[tokio::test]
    async fn rejected_token_is_source_unavailable() {
        let url = spawn_sheet_host().await;

        let res = source(&url, Some("stale-token")).fetch().await;
        assert!(matches!(res, Err(PipelineError::SourceUnavailable(msg)) if msg.contains("401")));

        let res = source(&url, None).fetch().await;
        assert!(matches!(res, Err(PipelineError::SourceUnavailable(_))));
    }
}
