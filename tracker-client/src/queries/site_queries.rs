use std::collections::BTreeMap;

use time::{Date, OffsetDateTime};

use crate::domain::{Kpis, SiteRecord, SiteStatus, TrendPoint};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Headline KPIs over a reconciled table.
///
/// The daily rate is a coarse historical average: installed count divided by
/// the whole-day span between the first and last installation (at least one
/// day). With no installed sites it is zero.
pub fn aggregate(records: &[SiteRecord]) -> Kpis {
    let total = records.len();
    let installed = records.iter().filter(|r| r.is_installed()).count();
    let open = total - installed;

    let progress_pct = if total > 0 {
        round2(100.0 * installed as f64 / total as f64)
    } else {
        0.0
    };

    let daily_rate = if installed == 0 {
        0.0
    } else {
        let dates: Vec<OffsetDateTime> = records
            .iter()
            .filter(|r| r.is_installed())
            .filter_map(|r| r.installation_date)
            .collect();
        let span_days = match (dates.iter().min(), dates.iter().max()) {
            (Some(first), Some(last)) => (*last - *first).whole_days().max(1),
            _ => 1,
        };
        round2(installed as f64 / span_days as f64)
    };

    Kpis {
        total,
        installed,
        open,
        progress_pct,
        daily_rate,
    }
}

/// Installed sites per calendar day, oldest first.
///
/// Installed records without a parsed date are left out.
pub fn daily_trend(records: &[SiteRecord]) -> Vec<TrendPoint> {
    let mut per_day: BTreeMap<Date, usize> = BTreeMap::new();
    for ts in records
        .iter()
        .filter(|r| r.is_installed())
        .filter_map(|r| r.installation_date)
    {
        *per_day.entry(ts.date()).or_default() += 1;
    }

    per_day
        .into_iter()
        .map(|(date, installed)| TrendPoint { date, installed })
        .collect()
}

/// Count per status, Installed first.
pub fn status_distribution(records: &[SiteRecord]) -> Vec<(SiteStatus, usize)> {
    let installed = records.iter().filter(|r| r.is_installed()).count();
    vec![
        (SiteStatus::Installed, installed),
        (SiteStatus::Open, records.len() - installed),
    ]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteFilter {
    /// Matched against the `Region` registry column, case-insensitively.
    pub region: Option<String>,
    pub status: Option<SiteStatus>,
    /// Inclusive lower bound on the installation day.
    pub from: Option<Date>,
    /// Inclusive upper bound on the installation day.
    pub to: Option<Date>,
}

impl SiteFilter {
    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.status.is_none() && self.from.is_none() && self.to.is_none()
    }

    fn matches(&self, record: &SiteRecord) -> bool {
        if let Some(region) = &self.region {
            let hit = record
                .attribute("Region")
                .is_some_and(|r| r.trim().eq_ignore_ascii_case(region.trim()));
            if !hit {
                return false;
            }
        }

        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }

        // A date bound implies an installation date; open sites fall out here.
        if self.from.is_some() || self.to.is_some() {
            let Some(day) = record.installation_date.map(|ts| ts.date()) else {
                return false;
            };
            if self.from.is_some_and(|from| day < from) || self.to.is_some_and(|to| day > to) {
                return false;
            }
        }

        true
    }
}

/// Subset of a reconciled table, in the original order.
pub fn filter_sites(records: &[SiteRecord], filter: &SiteFilter) -> Vec<SiteRecord> {
    if filter.is_empty() {
        return records.to_vec();
    }
    records.iter().filter(|r| filter.matches(r)).cloned().collect()
}
