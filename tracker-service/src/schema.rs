//! Column resolution for loosely formatted spreadsheet headers.
//!
//! Stages are tried in order and the first stage that yields exactly one
//! column wins:
//! 1. the configured hint, exact;
//! 2. a canonical name, exact (canonical names are tried in priority order);
//! 3. a canonical name, ignoring case, whitespace and punctuation;
//! 4. token match: every token of a group occurs in the lower-cased header.
//!
//! A stage that yields several columns is an error rather than a guess.

/// How to find one logical column in a header row.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub canonical: &'static [&'static str],
    pub tokens: &'static [&'static [&'static str]],
}

pub const SITE_ID: ColumnSpec = ColumnSpec {
    name: "Site ID",
    canonical: &["Site ID"],
    tokens: &[&["site", "id"]],
};

pub const LATITUDE: ColumnSpec = ColumnSpec {
    name: "Latitude",
    canonical: &["Latitude", "Lat"],
    tokens: &[&["lat"]],
};

pub const LONGITUDE: ColumnSpec = ColumnSpec {
    name: "Longitude",
    canonical: &["Longitude", "Long", "Lon", "Lng"],
    tokens: &[&["lon"], &["lng"]],
};

pub const INSTALLED_AT: ColumnSpec = ColumnSpec {
    name: "Timestamp",
    canonical: &["Timestamp", "Installation Date"],
    tokens: &[&["date"]],
};

/// Leading columns of the reconciled table, ahead of the registry attributes.
pub const RECONCILED_COLUMNS: [&str; 5] = ["Site ID", "Latitude", "Longitude", "Status", "Installation Date"];

/// True when a registry header would shadow one of [`RECONCILED_COLUMNS`].
pub fn is_reconciled_column(header: &str) -> bool {
    RECONCILED_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(header.trim()))
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required column '{column}' not found in {source_name} (headers: {headers:?})")]
    MissingColumn {
        column: &'static str,
        source_name: String,
        headers: Vec<String>,
    },
    #[error("column '{column}' is ambiguous in {source_name}: candidates {candidates:?}")]
    AmbiguousColumn {
        column: &'static str,
        source_name: String,
        candidates: Vec<String>,
    },
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

enum Stage {
    Found(usize),
    Ambiguous(Vec<usize>),
    None,
}

fn single(hits: Vec<usize>) -> Stage {
    match hits.len() {
        0 => Stage::None,
        1 => Stage::Found(hits[0]),
        _ => Stage::Ambiguous(hits),
    }
}

fn positions<F>(headers: &[String], pred: F) -> Vec<usize>
where
    F: Fn(&str) -> bool,
{
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| pred(h.trim()))
        .map(|(i, _)| i)
        .collect()
}

fn stages(headers: &[String], spec: &ColumnSpec, hint: Option<&str>) -> Stage {
    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        if let found @ (Stage::Found(_) | Stage::Ambiguous(_)) = single(positions(headers, |h| h == hint)) {
            return found;
        }
    }

    for name in spec.canonical {
        if let found @ (Stage::Found(_) | Stage::Ambiguous(_)) = single(positions(headers, |h| h == *name)) {
            return found;
        }
    }

    for name in spec.canonical {
        let want = squash(name);
        if let found @ (Stage::Found(_) | Stage::Ambiguous(_)) =
            single(positions(headers, |h| squash(h) == want))
        {
            return found;
        }
    }

    single(positions(headers, |h| {
        let lower = h.to_lowercase();
        spec.tokens
            .iter()
            .any(|group| group.iter().all(|t| lower.contains(t)))
    }))
}

/// Locate a required column.
pub fn resolve_column(
    headers: &[String],
    spec: &ColumnSpec,
    hint: Option<&str>,
    source_name: &str,
) -> Result<usize, SchemaError> {
    match stages(headers, spec, hint) {
        Stage::Found(idx) => Ok(idx),
        Stage::Ambiguous(hits) => Err(SchemaError::AmbiguousColumn {
            column: spec.name,
            source_name: source_name.to_string(),
            candidates: hits.into_iter().map(|i| headers[i].clone()).collect(),
        }),
        Stage::None => Err(SchemaError::MissingColumn {
            column: spec.name,
            source_name: source_name.to_string(),
            headers: headers.to_vec(),
        }),
    }
}

/// Locate an optional column; absence is `Ok(None)`, ambiguity is still an error.
pub fn resolve_optional_column(
    headers: &[String],
    spec: &ColumnSpec,
    source_name: &str,
) -> Result<Option<usize>, SchemaError> {
    match resolve_column(headers, spec, None, source_name) {
        Ok(idx) => Ok(Some(idx)),
        Err(SchemaError::MissingColumn { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
