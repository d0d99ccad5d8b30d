use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EquipmentError {
    #[error("CSV must contain columns: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    #[error("CSV contains no data rows")]
    EmptyDataset,

    #[error("Row {row}: {}", describe_malformed(.column.as_deref(), .value))]
    MalformedRow {
        /// 1-based data row index (the header line is not counted).
        row: usize,
        column: Option<String>,
        value: String,
    },

    #[error("Dataset not found: {0}")]
    NotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(String),
}

fn describe_malformed(column: Option<&str>, value: &str) -> String {
    match column {
        Some(col) => format!("column '{col}' has non-numeric value '{value}'"),
        None => format!("unreadable record ({value})"),
    }
}

impl EquipmentError {
    pub fn storage(e: impl std::fmt::Display) -> Self {
        Self::Storage(e.to_string())
    }

    /// True for errors the uploader can fix by correcting the file.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::EmptyDataset | Self::MalformedRow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EquipmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_missing_columns() {
        let e = EquipmentError::Validation {
            missing: vec!["Pressure".into(), "Temperature".into()],
        };
        assert_eq!(e.to_string(), "CSV must contain columns: Pressure, Temperature");
        assert!(e.is_user_correctable());
    }

    #[test]
    fn malformed_row_message_names_row_and_column() {
        let e = EquipmentError::MalformedRow {
            row: 3,
            column: Some("Flowrate".into()),
            value: "abc".into(),
        };
        assert_eq!(e.to_string(), "Row 3: column 'Flowrate' has non-numeric value 'abc'");
    }

    #[test]
    fn storage_is_not_user_correctable() {
        assert!(!EquipmentError::storage("connection refused").is_user_correctable());
    }
}
