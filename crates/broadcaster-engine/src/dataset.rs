//! Recipient datasets.
//!
//! The first sheet of a workbook is read with `calamine`; its first row is
//! the header and must name both a `telegram_id` and an `email` column.

use async_trait::async_trait;
use broadcaster_core::{BroadcastError, BroadcastResult, CellValue, RecipientRow};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header of the phone column.
pub const PHONE_COLUMN: &str = "telegram_id";
/// Header of the email column.
pub const EMAIL_COLUMN: &str = "email";

/// Somewhere recipient rows can be loaded from.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    /// Human-readable description for logs and errors.
    fn describe(&self) -> String;

    /// Loads every row, in order.
    async fn load(&self) -> BroadcastResult<Vec<RecipientRow>>;
}

/// An `.xlsx`, `.xls`, `.xlsb` or `.ods` workbook on disk.
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
}

impl SpreadsheetSource {
    /// Creates a source for `path`. Nothing is read until [`RecipientSource::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the workbook.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecipientSource for SpreadsheetSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> BroadcastResult<Vec<RecipientRow>> {
        if !self.path.exists() {
            return Err(BroadcastError::Dataset(format!(
                "'{}' not found",
                self.path.display()
            )));
        }
        let path = self.path.clone();
        let rows = tokio::task::spawn_blocking(move || read_workbook(&path))
            .await
            .map_err(|e| BroadcastError::Dataset(format!("Workbook reader panicked: {e}")))??;
        info!(path = %self.path.display(), rows = rows.len(), "Recipients loaded");
        Ok(rows)
    }
}

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<RecipientRow>,
}

impl StaticSource {
    /// Wraps already parsed rows.
    pub fn new(rows: Vec<RecipientRow>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl RecipientSource for StaticSource {
    fn describe(&self) -> String {
        format!("{} in-memory rows", self.rows.len())
    }

    async fn load(&self) -> BroadcastResult<Vec<RecipientRow>> {
        Ok(self.rows.clone())
    }
}

fn read_workbook(path: &Path) -> BroadcastResult<Vec<RecipientRow>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        BroadcastError::Dataset(format!("Error reading '{}': {e}", path.display()))
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BroadcastError::Dataset(format!("'{}' has no sheets", path.display())))?
        .map_err(|e| BroadcastError::Dataset(format!("Error reading '{}': {e}", path.display())))?;

    let cells = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();
    recipients_from_rows(cells)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(n) => CellValue::Integer(*n),
        Data::Float(n) => CellValue::Number(*n),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}

/// Turns a header row plus data rows into recipients.
///
/// Header names are matched after trimming. Cells past the end of a short
/// row read as empty. Rows keep their order and are numbered from 1.
pub fn recipients_from_rows(rows: Vec<Vec<CellValue>>) -> BroadcastResult<Vec<RecipientRow>> {
    let mut rows = rows.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| BroadcastError::Dataset("Workbook is empty; expected a header row".to_string()))?;

    let column = |name: &str| {
        header
            .iter()
            .position(|cell| matches!(cell, CellValue::Text(text) if text.trim() == name))
    };
    let (phone_idx, email_idx) = match (column(PHONE_COLUMN), column(EMAIL_COLUMN)) {
        (Some(phone), Some(email)) => (phone, email),
        (phone, email) => {
            let missing: Vec<&str> = [(PHONE_COLUMN, phone), (EMAIL_COLUMN, email)]
                .into_iter()
                .filter_map(|(name, idx)| idx.is_none().then_some(name))
                .collect();
            return Err(BroadcastError::Dataset(format!(
                "Missing column(s): {}",
                missing.join(", ")
            )));
        }
    };
    debug!(phone_idx, email_idx, "Header parsed");

    Ok(rows
        .enumerate()
        .map(|(idx, mut row)| {
            let mut take = |i: usize| row.get_mut(i).map(std::mem::take).unwrap_or_default();
            let telegram_id = take(phone_idx);
            let email = take(email_idx);
            RecipientRow {
                number: idx + 1,
                telegram_id,
                email,
            }
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<CellValue> {
        cols.iter().map(|c| CellValue::from(*c)).collect()
    }

    #[test]
    fn test_rows_keep_order_and_columns() {
        let rows = recipients_from_rows(vec![
            header(&["name", "email", "telegram_id"]),
            vec!["Ada".into(), "ada@example.com".into(), 919_876_543_210.0.into()],
            vec!["Bob".into(), CellValue::Empty, "98765".into()],
        ])
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].telegram_id, CellValue::Number(919_876_543_210.0));
        assert_eq!(rows[0].email, CellValue::from("ada@example.com"));
        assert_eq!(rows[1].number, 2);
        assert_eq!(rows[1].email, CellValue::Empty);
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let rows = recipients_from_rows(vec![
            header(&["telegram_id", "email"]),
            vec!["9876543210".into()],
        ])
        .unwrap();
        assert_eq!(rows[0].email, CellValue::Empty);
    }

    #[test]
    fn test_header_is_trimmed() {
        let rows = recipients_from_rows(vec![header(&[" telegram_id ", "email "])]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_column() {
        let err = recipients_from_rows(vec![header(&["phone", "email"])]).unwrap_err();
        assert!(err.to_string().contains("telegram_id"));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_empty_workbook() {
        assert!(recipients_from_rows(vec![]).is_err());
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_data(&Data::Float(1.5)), CellValue::Number(1.5));
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Integer(7));
        assert_eq!(cell_from_data(&Data::Empty), CellValue::Empty);
        assert_eq!(
            cell_from_data(&Data::String("x".into())),
            CellValue::Text("x".into())
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let source = SpreadsheetSource::new(tmp.path().join("data.xlsx"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, BroadcastError::Dataset(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_unreadable_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.xlsx");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        let err = SpreadsheetSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, BroadcastError::Dataset(_)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new(vec![RecipientRow::new(1, "9876543210", "a@b.c")]);
        assert_eq!(source.load().await.unwrap().len(), 1);
        assert_eq!(source.describe(), "1 in-memory rows");
    }
}
