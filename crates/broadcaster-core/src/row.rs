use serde::{Deserialize, Serialize};
use std::fmt;

/// A single spreadsheet cell as read from the input workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    /// Blank cell, missing column, or an error cell such as `#N/A`.
    #[default]
    Empty,
    /// Integer cell.
    Integer(i64),
    /// Floating point cell. Phone numbers typed into a spreadsheet usually
    /// land here, e.g. `919876543210.0`.
    Number(f64),
    /// Text cell, kept verbatim.
    Text(String),
    /// Boolean cell.
    Bool(bool),
}

impl CellValue {
    /// Blank cells and empty strings.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(text) => f.write_str(text),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// One recipient candidate read from the input dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientRow {
    /// 1-based position among the data rows (header excluded).
    pub number: usize,
    /// Raw `telegram_id` cell; any type or format.
    pub telegram_id: CellValue,
    /// Raw `email` cell.
    pub email: CellValue,
}

impl RecipientRow {
    /// Creates a row from its two cells.
    pub fn new(number: usize, telegram_id: impl Into<CellValue>, email: impl Into<CellValue>) -> Self {
        Self {
            number,
            telegram_id: telegram_id.into(),
            email: email.into(),
        }
    }

    /// The email address to deliver to, if the cell holds anything.
    ///
    /// Only blank cells and empty strings count as absent. Surrounding
    /// whitespace is trimmed; whitespace-only text is kept as is, so the send
    /// is attempted and fails on the relay side.
    pub fn email_address(&self) -> Option<String> {
        match &self.email {
            CellValue::Empty => None,
            CellValue::Text(text) if text.is_empty() => None,
            CellValue::Text(text) => {
                let trimmed = text.trim();
                Some(if trimmed.is_empty() { text.as_str() } else { trimmed }.to_string())
            }
            other => Some(other.to_string()),
        }
    }
}
