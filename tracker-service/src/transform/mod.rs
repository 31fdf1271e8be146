use std::collections::HashMap;

use tracker_client::domain::{normalize_site_id, InstallationEvent, RegistrySite, SiteRecord, SiteStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Fill missing registry coordinates from the matched event.
    pub coordinate_fallback: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            coordinate_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub registry_rows: usize,
    pub events_total: usize,
    /// Events whose site id is not in the registry.
    pub events_discarded: usize,
    /// Joined rows dropped for unresolved coordinates.
    pub rows_dropped: usize,
    /// Installed rows whose timestamp could not be parsed.
    pub undated_installs: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<SiteRecord>,
    pub stats: ReconcileStats,
}

/// Coerce a coordinate cell to a number within `limit` degrees of zero.
pub fn coerce_coordinate(raw: Option<&str>, limit: f64) -> Option<f64> {
    let v: f64 = raw?.trim().parse().ok()?;
    if v.is_finite() && v.abs() <= limit {
        Some(v)
    } else {
        None
    }
}

fn pick<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    let blank = |s: &&str| s.trim().is_empty();
    match primary.filter(|s| !blank(s)) {
        Some(v) => Some(v),
        None => fallback.filter(|s| !blank(s)),
    }
}

/// Left-join the registry against installation events.
///
/// - ids are normalized on both sides before matching;
/// - events for ids outside the registry are discarded;
/// - each registry row yields one row per matching event, or one Open row;
/// - registry coordinates win, event coordinates fill the gaps;
/// - rows whose coordinates still do not resolve are dropped.
///
/// Output keeps registry order. No state survives between calls.
pub fn reconcile(registry: &[RegistrySite], events: &[InstallationEvent], options: &ReconcileOptions) -> Reconciliation {
    let mut stats = ReconcileStats {
        registry_rows: registry.len(),
        events_total: events.len(),
        ..ReconcileStats::default()
    };

    let registry_ids: Vec<String> = registry.iter().map(|s| normalize_site_id(&s.site_id)).collect();

    let mut by_id: HashMap<&str, Vec<&InstallationEvent>> =
        registry_ids.iter().map(|id| (id.as_str(), Vec::new())).collect();
    let mut normalized_event_ids: Vec<String> = Vec::with_capacity(events.len());
    for ev in events {
        normalized_event_ids.push(normalize_site_id(&ev.site_id));
    }
    for (ev, id) in events.iter().zip(&normalized_event_ids) {
        match by_id.get_mut(id.as_str()) {
            Some(bucket) if !id.is_empty() => bucket.push(ev),
            _ => stats.events_discarded += 1,
        }
    }

    let mut records = Vec::with_capacity(registry.len());
    for (site, site_id) in registry.iter().zip(&registry_ids) {
        let matches = by_id.get(site_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let joined: Vec<Option<&InstallationEvent>> = if matches.is_empty() {
            vec![None]
        } else {
            matches.iter().copied().map(Some).collect()
        };

        for event in joined {
            let (ev_lat, ev_lon) = match (event, options.coordinate_fallback) {
                (Some(ev), true) => (ev.latitude.as_deref(), ev.longitude.as_deref()),
                _ => (None, None),
            };
            let latitude = coerce_coordinate(pick(site.latitude.as_deref(), ev_lat), 90.0);
            let longitude = coerce_coordinate(pick(site.longitude.as_deref(), ev_lon), 180.0);

            let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
                stats.rows_dropped += 1;
                continue;
            };

            let installed = event.is_some_and(InstallationEvent::has_timestamp);
            let installation_date = if installed { event.and_then(|e| e.timestamp) } else { None };
            if installed && installation_date.is_none() {
                stats.undated_installs += 1;
            }

            records.push(SiteRecord {
                site_id: site_id.clone(),
                latitude,
                longitude,
                status: if installed {
                    SiteStatus::Installed
                } else {
                    SiteStatus::Open
                },
                installation_date,
                attributes: site.attributes.clone(),
            });
        }
    }

    Reconciliation { records, stats }
}
