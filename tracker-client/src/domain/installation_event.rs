use time::OffsetDateTime;

/// A report that a site was installed, from the installation form/sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationEvent {
    pub site_id: String,
    /// Timestamp cell as it appeared in the source; `None` when blank.
    pub timestamp_raw: Option<String>,
    /// Parsed timestamp; `None` when blank or unparseable.
    pub timestamp: Option<OffsetDateTime>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl InstallationEvent {
    /// True when the event carries a non-blank timestamp cell, parsed or not.
    pub fn has_timestamp(&self) -> bool {
        self.timestamp_raw
            .as_deref()
            .is_some_and(|raw| !raw.trim().is_empty())
    }
}
