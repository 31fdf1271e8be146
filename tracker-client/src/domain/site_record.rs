use std::{fmt, str::FromStr};

use time::OffsetDateTime;

/// Canonical form of a site identifier: trimmed and upper-cased.
///
/// Both sources must go through this before they are joined.
pub fn normalize_site_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SiteStatus {
    Installed,
    Open,
}

impl SiteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "Installed",
            Self::Open => "Open",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown site status '{0}' (expected Installed or Open)")]
pub struct ParseSiteStatusError(pub String);

impl FromStr for SiteStatus {
    type Err = ParseSiteStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "installed" => Ok(Self::Installed),
            "open" => Ok(Self::Open),
            _ => Err(ParseSiteStatusError(s.to_string())),
        }
    }
}

/// A reconciled site, ready for the map, the charts and the exports.
///
/// Coordinates are always resolved; rows without them never become records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SiteRecord {
    pub site_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: SiteStatus,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub installation_date: Option<OffsetDateTime>,
    pub attributes: Vec<(String, String)>,
}

impl SiteRecord {
    pub fn is_installed(&self) -> bool {
        self.status == SiteStatus::Installed
    }

    /// Case-insensitive lookup of a carried-over registry column.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name.trim()))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_site_id_trims_and_uppercases() {
        assert_eq!(normalize_site_id("  riy0001\t"), "RIY0001");
        assert_eq!(normalize_site_id("RIY0002"), "RIY0002");
        assert_eq!(normalize_site_id("   "), "");
    }

    #[test]
    fn site_status_parses_case_insensitively() {
        assert_eq!("installed".parse::<SiteStatus>(), Ok(SiteStatus::Installed));
        assert_eq!(" OPEN ".parse::<SiteStatus>(), Ok(SiteStatus::Open));
        assert!("done".parse::<SiteStatus>().is_err());
    }

    #[test]
    fn attribute_lookup_ignores_case() {
        let record = SiteRecord {
            site_id: "RIY0001".to_string(),
            latitude: 24.1,
            longitude: 46.2,
            status: SiteStatus::Open,
            installation_date: None,
            attributes: vec![("Region".to_string(), "Riyadh".to_string())],
        };

        assert_eq!(record.attribute("region"), Some("Riyadh"));
        assert_eq!(record.attribute("Site Name"), None);
    }
}
