use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

use crate::{
    pipeline::{PipelineError, Sink, Snapshot},
    schema::RECONCILED_COLUMNS,
    sinks::installation_date_text,
};

const SHEET_NAME: &str = "Sites";

/// Registry values that read as numbers are written as numeric cells.
fn numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn write_text(sheet: &mut Worksheet, row: u32, col: u16, text: &str) -> Result<(), XlsxError> {
    if !text.is_empty() {
        sheet.write_string(row, col, text)?;
    }
    Ok(())
}

/// Single-sheet workbook with every reconciled column.
#[derive(Debug, Clone, Default)]
pub struct XlsxSink;

impl XlsxSink {
    pub fn workbook(snapshot: &Snapshot) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        let headers = RECONCILED_COLUMNS
            .iter()
            .copied()
            .chain(snapshot.attribute_columns.iter().map(String::as_str));
        for (col, name) in (0u16..).zip(headers) {
            sheet.write_string(0, col, name)?;
        }

        let first_attribute = RECONCILED_COLUMNS.len() as u16;
        for (row, r) in (1u32..).zip(&snapshot.records) {
            sheet.write_string(row, 0, &r.site_id)?;
            sheet.write_number(row, 1, r.latitude)?;
            sheet.write_number(row, 2, r.longitude)?;
            sheet.write_string(row, 3, r.status.as_str())?;
            write_text(sheet, row, 4, &installation_date_text(r))?;

            for (col, name) in (first_attribute..).zip(&snapshot.attribute_columns) {
                let value = r.attribute(name).unwrap_or("");
                match numeric(value) {
                    Some(n) => {
                        sheet.write_number(row, col, n)?;
                    }
                    None => write_text(sheet, row, col, value)?,
                }
            }
        }

        Ok(workbook)
    }
}

impl Sink for XlsxSink {
    fn file_name(&self) -> &str {
        "installation_status.xlsx"
    }

    fn content_type(&self) -> &'static str {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    }

    fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, PipelineError> {
        Self::workbook(snapshot)
            .and_then(|mut wb| wb.save_to_buffer())
            .map_err(|e| PipelineError::Export(format!("failed to build xlsx: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sources::Table, transform::ReconcileStats};
    use calamine::{Data, Reader};
    use std::io::Cursor;
    use time::{macros::datetime, OffsetDateTime};
    use tracker_client::{
        domain::{SiteRecord, SiteStatus},
        queries,
    };

    fn snapshot() -> Snapshot {
        let records = vec![
            SiteRecord {
                site_id: "RIY0001".to_string(),
                latitude: 24.1,
                longitude: 46.2,
                status: SiteStatus::Installed,
                installation_date: Some(datetime!(2025-01-10 00:00:00 UTC)),
                attributes: vec![
                    ("Region".to_string(), "Riyadh & Co".to_string()),
                    ("Capacity kW".to_string(), "12.5".to_string()),
                ],
            },
            SiteRecord {
                site_id: "RIY0003".to_string(),
                latitude: 23.0,
                longitude: 45.0,
                status: SiteStatus::Open,
                installation_date: None,
                attributes: vec![
                    ("Region".to_string(), "<Qassim>".to_string()),
                    ("Capacity kW".to_string(), String::new()),
                ],
            },
        ];
        Snapshot {
            kpis: queries::aggregate(&records),
            records,
            attribute_columns: vec!["Region".to_string(), "Capacity kW".to_string()],
            stats: ReconcileStats::default(),
            fingerprint: String::new(),
            built_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn numeric_attribute_values() {
        assert_eq!(numeric(" 12.5 "), Some(12.5));
        assert_eq!(numeric("7"), Some(7.0));
        assert_eq!(numeric("Riyadh"), None);
        assert_eq!(numeric("NaN"), None);
        assert_eq!(numeric("inf"), None);
        assert_eq!(numeric(""), None);
    }

    #[test]
    fn sheet_cells_keep_their_types() {
        let bytes = XlsxSink.render(&snapshot()).unwrap();
        let mut wb = calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let range = wb.worksheet_range("Sites").unwrap();

        assert_eq!(range.get_value((0, 6)), Some(&Data::String("Capacity kW".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(24.1)));
        assert_eq!(range.get_value((2, 2)), Some(&Data::Float(45.0)));
        assert_eq!(range.get_value((1, 5)), Some(&Data::String("Riyadh & Co".to_string())));
        assert_eq!(range.get_value((1, 6)), Some(&Data::Float(12.5)));
        assert_eq!(range.get_value((2, 5)), Some(&Data::String("<Qassim>".to_string())));
    }

    #[test]
    fn workbook_reads_back_as_a_table() {
        let bytes = XlsxSink.render(&snapshot()).unwrap();
        let table = Table::from_xlsx(bytes, Some("Sites")).unwrap();

        assert_eq!(
            table.headers,
            vec![
                "Site ID",
                "Latitude",
                "Longitude",
                "Status",
                "Installation Date",
                "Region",
                "Capacity kW"
            ]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], "RIY0001");
        assert_eq!(table.rows[0][1], "24.1");
        assert_eq!(table.rows[0][4], "2025-01-10 00:00:00");
        assert_eq!(table.rows[1][3], "Open");
        assert_eq!(table.rows[1][4], "");
        assert_eq!(table.rows[1][6], "");
    }
}
