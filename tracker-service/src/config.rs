use serde::Deserialize;
use std::fs;

use crate::sources::TableFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Url,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub location: String,
    /// Inferred from the location when absent.
    pub format: Option<TableFormat>,
    /// Worksheet to read from workbook sources; first sheet when absent.
    pub sheet: Option<String>,
    pub auth_bearer_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Preferred header for the site id column.
    pub key_column_hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_true")]
    pub coordinate_fallback: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            coordinate_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub registry: SourceConfig,
    pub events: SourceConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub dashboard: DashboardConfig,
    pub metrics: Option<MetricsConfig>,
}

impl SourceConfig {
    fn validate(&self, section: &str) -> anyhow::Result<()> {
        let location = self.location.trim();
        if location.is_empty() {
            anyhow::bail!("{section}.location must not be empty");
        }
        let is_http = location.starts_with("http://") || location.starts_with("https://");
        match self.kind {
            SourceKind::Url if !is_http => {
                anyhow::bail!("{section}.location must be an http(s) URL when kind = \"url\"")
            }
            SourceKind::File if is_http => {
                anyhow::bail!("{section}.location looks like a URL but kind = \"file\"")
            }
            _ => {}
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("{section}.timeout_secs must be positive");
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("TRACKER_CONFIG").unwrap_or_else(|_| "tracker-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.registry.validate("registry")?;
        cfg.events.validate("events")?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [registry]
        kind = "url"
        location = "https://docs.google.com/spreadsheets/d/abc/export?format=csv&gid=622694975"
        key_column_hint = "Site ID"

        [events]
        kind = "file"
        location = "data/form_responses.xlsx"
        format = "xlsx"
        sheet = "Form Responses 1"

        [reconcile]
        coordinate_fallback = false

        [cache]
        ttl_secs = 60

        [dashboard]
        bind_addr = "127.0.0.1:8080"

        [metrics]
        bind_addr = "127.0.0.1:9090"
    "#;

    #[test]
    fn parses_full_config() {
        let cfg = AppConfig::from_toml_str(FULL).unwrap();
        assert_eq!(cfg.registry.kind, SourceKind::Url);
        assert_eq!(cfg.registry.timeout_secs, 30);
        assert_eq!(cfg.registry.key_column_hint.as_deref(), Some("Site ID"));
        assert_eq!(cfg.events.format, Some(TableFormat::Xlsx));
        assert_eq!(cfg.events.sheet.as_deref(), Some("Form Responses 1"));
        assert!(!cfg.reconcile.coordinate_fallback);
        assert_eq!(cfg.cache.ttl_secs, 60);
        assert_eq!(cfg.metrics.map(|m| m.bind_addr).as_deref(), Some("127.0.0.1:9090"));
    }

    #[test]
    fn optional_sections_default() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [registry]
            kind = "file"
            location = "sites.csv"

            [events]
            kind = "file"
            location = "installs.csv"

            [dashboard]
            bind_addr = "0.0.0.0:8080"
            "#,
        )
        .unwrap();
        assert!(cfg.reconcile.coordinate_fallback);
        assert_eq!(cfg.cache.ttl_secs, 600);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn url_kind_requires_http_location() {
        let res = AppConfig::from_toml_str(
            r#"
            [registry]
            kind = "url"
            location = "sites.csv"

            [events]
            kind = "file"
            location = "installs.csv"

            [dashboard]
            bind_addr = "0.0.0.0:8080"
            "#,
        );
        let err = res.unwrap_err().to_string();
        assert!(err.contains("registry.location"), "{err}");
    }
}
