//! CSV decoding and header validation.

use crate::error::{EquipmentError, Result};
use crate::schema::REQUIRED_COLUMNS;

/// Decoded CSV: header labels plus data rows, each row aligned with `headers`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Decode raw upload bytes. The first record is the header row; cells are
    /// kept verbatim (no trimming). Records with the wrong number of fields or
    /// invalid UTF-8 are reported with their 1-based data row number; row 0 is
    /// the header line.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::None)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| EquipmentError::MalformedRow {
                row: 0,
                column: None,
                value: csv_error_reason(&e),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| EquipmentError::MalformedRow {
                row: i + 1,
                column: None,
                value: csv_error_reason(&e),
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn column(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == label)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_error_reason(e: &csv::Error) -> String {
    match e.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {expected_len} fields, found {len}")
        }
        csv::ErrorKind::Utf8 { .. } => "invalid UTF-8".to_string(),
        _ => e.to_string(),
    }
}

/// Returns the table unchanged if every `required` label is a header,
/// otherwise the missing labels in `required` order.
pub fn validate_columns(table: Table, required: &[&str]) -> Result<Table> {
    let missing: Vec<String> = required
        .iter()
        .filter(|label| table.column(label).is_none())
        .map(|label| label.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(EquipmentError::Validation { missing });
    }
    Ok(table)
}

pub fn validate_equipment_table(table: Table) -> Result<Table> {
    validate_columns(table, &REQUIRED_COLUMNS)
}
