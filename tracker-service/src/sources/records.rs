//! Mapping loaded tables onto registry sites and installation events.

use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime, PrimitiveDateTime};
use tracker_client::domain::{normalize_site_id, InstallationEvent, RegistrySite};

use crate::{
    schema::{self, resolve_column, resolve_optional_column, SchemaError},
    sources::Table,
};

/// Parse an installation timestamp. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(ts);
    }

    let datetime_formats = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
        format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
        format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
    ];
    let date_formats = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
    ];

    // Some exports use a `T` separator without an offset.
    let spaced = s.replacen('T', " ", 1);
    for fmt in datetime_formats {
        if let Ok(ts) = PrimitiveDateTime::parse(&spaced, fmt) {
            return Some(ts.assume_utc());
        }
    }
    for fmt in date_formats {
        if let Ok(d) = Date::parse(s, fmt) {
            return Some(d.midnight().assume_utc());
        }
    }
    None
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn raw(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn cell(row: &[String], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| non_blank(raw(row, i)))
}

#[derive(Debug, Clone, Default)]
pub struct RegistryTable {
    /// Names of the carried-over columns, in header order.
    pub attribute_columns: Vec<String>,
    pub sites: Vec<RegistrySite>,
}

/// Read the project registry. Fails only when the site id column cannot be found.
pub fn registry_sites(table: &Table, key_hint: Option<&str>, source_name: &str) -> Result<RegistryTable, SchemaError> {
    let headers = &table.headers;
    let id_col = resolve_column(headers, &schema::SITE_ID, key_hint, source_name)?;
    let lat_col = resolve_optional_column(headers, &schema::LATITUDE, source_name)?;
    let lon_col = resolve_optional_column(headers, &schema::LONGITUDE, source_name)?;

    let attribute_idx: Vec<usize> = (0..headers.len())
        .filter(|i| *i != id_col && Some(*i) != lat_col && Some(*i) != lon_col)
        .filter(|i| !headers[*i].is_empty())
        .filter(|i| {
            let shadowed = schema::is_reconciled_column(&headers[*i]);
            if shadowed {
                tracing::debug!(source = %source_name, column = %headers[*i], "registry column replaced by reconciled value");
            }
            !shadowed
        })
        .collect();
    let attribute_columns: Vec<String> = attribute_idx.iter().map(|i| headers[*i].clone()).collect();

    let sites = table
        .rows
        .iter()
        .map(|row| RegistrySite {
            site_id: normalize_site_id(raw(row, id_col)),
            latitude: cell(row, lat_col),
            longitude: cell(row, lon_col),
            attributes: attribute_idx
                .iter()
                .map(|i| (headers[*i].clone(), raw(row, *i).trim().to_string()))
                .collect(),
        })
        .collect();

    Ok(RegistryTable {
        attribute_columns,
        sites,
    })
}

/// Read the installation events. Rows without a site id are skipped.
pub fn installation_events(
    table: &Table,
    key_hint: Option<&str>,
    source_name: &str,
) -> Result<Vec<InstallationEvent>, SchemaError> {
    let headers = &table.headers;
    let id_col = resolve_column(headers, &schema::SITE_ID, key_hint, source_name)?;
    let ts_col = resolve_column(headers, &schema::INSTALLED_AT, None, source_name)?;
    let lat_col = resolve_optional_column(headers, &schema::LATITUDE, source_name)?;
    let lon_col = resolve_optional_column(headers, &schema::LONGITUDE, source_name)?;

    let mut unparsed = 0usize;
    let events: Vec<InstallationEvent> = table
        .rows
        .iter()
        .filter_map(|row| {
            let site_id = normalize_site_id(raw(row, id_col));
            if site_id.is_empty() {
                return None;
            }
            let timestamp_raw = cell(row, Some(ts_col));
            let timestamp = timestamp_raw.as_deref().and_then(parse_timestamp);
            if timestamp_raw.is_some() && timestamp.is_none() {
                unparsed += 1;
            }
            Some(InstallationEvent {
                site_id,
                timestamp_raw,
                timestamp,
                latitude: cell(row, lat_col),
                longitude: cell(row, lon_col),
            })
        })
        .collect();

    if unparsed > 0 {
        tracing::warn!(source = %source_name, unparsed, "installation timestamps that could not be parsed");
    }

    Ok(events)
}
