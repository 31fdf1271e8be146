use std::io::Cursor;

use calamine::{Data, Reader};
use serde::Deserialize;
use time::{macros::datetime, Duration, PrimitiveDateTime};

use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Guess the format from a path or URL. Defaults to CSV.
    pub fn infer(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or("");
        if path.ends_with(".xlsx") || path.ends_with(".xlsm") || path.ends_with(".xls") {
            return Self::Xlsx;
        }
        if lower.contains("format=xlsx") {
            return Self::Xlsx;
        }
        Self::Csv
    }
}

/// A loaded sheet: trimmed headers plus rows padded to the header width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn parse(bytes: Vec<u8>, format: TableFormat, sheet: Option<&str>) -> Result<Self, PipelineError> {
        match format {
            TableFormat::Csv => Self::from_csv(&bytes),
            TableFormat::Xlsx => Self::from_xlsx(bytes, sheet),
        }
    }

    pub fn from_csv(bytes: &[u8]) -> Result<Self, PipelineError> {
        reject_html(bytes)?;

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| PipelineError::SourceUnavailable(format!("failed to read CSV headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for result in rdr.records() {
            let record = result
                .map_err(|e| PipelineError::SourceUnavailable(format!("failed to read CSV record: {e}")))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::from_parts(headers, rows)
    }

    pub fn from_xlsx(bytes: Vec<u8>, sheet: Option<&str>) -> Result<Self, PipelineError> {
        reject_html(&bytes)?;

        let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| PipelineError::SourceUnavailable(format!("failed to open workbook: {e}")))?;

        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| PipelineError::SourceUnavailable("workbook has no sheets".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| PipelineError::SourceUnavailable(format!("failed to read sheet '{sheet_name}': {e}")))?;

        let mut iter = range.rows();
        let headers: Vec<String> = iter
            .next()
            .map(|row| row.iter().map(cell_to_string).collect())
            .unwrap_or_default();
        let rows: Vec<Vec<String>> = iter.map(|row| row.iter().map(cell_to_string).collect()).collect();

        Self::from_parts(headers, rows)
    }

    fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, PipelineError> {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        if headers.iter().all(String::is_empty) {
            return Err(PipelineError::SourceUnavailable("no header row found".to_string()));
        }

        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Login walls and share dialogs come back as HTML with a 200.
fn reject_html(bytes: &[u8]) -> Result<(), PipelineError> {
    let head: String = String::from_utf8_lossy(&bytes[..bytes.len().min(512)])
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Err(PipelineError::SourceUnavailable(
            "received an HTML page instead of tabular data (is the sheet shared for export?)".to_string(),
        ));
    }
    Ok(())
}

/// Date-formatted numeric cell to `YYYY-MM-DD HH:MM:SS`. Serials outside the
/// representable range keep their numeric text.
fn excel_serial_to_string(serial: f64) -> String {
    let epoch = datetime!(1899-12-30 00:00:00);
    let secs = (serial * 86_400.0).round() as i64;
    let ts: Option<PrimitiveDateTime> = if serial.is_finite() {
        epoch.checked_add(Duration::seconds(secs))
    } else {
        None
    };
    match ts {
        Some(ts) => super::format_timestamp(ts.assume_utc()),
        None => cell_to_string(&Data::Float(serial)),
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => excel_serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
