use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uctenka_core::{FieldKind, FieldResult, NormalizedAmount};

/// The three located fields of one receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub price: FieldResult,
    pub date: FieldResult,
    pub vendor: FieldResult,
}

impl ExtractedReceipt {
    pub fn get(&self, kind: FieldKind) -> &FieldResult {
        match kind {
            FieldKind::Price => &self.price,
            FieldKind::Date => &self.date,
            FieldKind::Vendor => &self.vendor,
        }
    }

    pub fn get_mut(&mut self, kind: FieldKind) -> &mut FieldResult {
        match kind {
            FieldKind::Price => &mut self.price,
            FieldKind::Date => &mut self.date,
            FieldKind::Vendor => &mut self.vendor,
        }
    }

    /// Flattens the receipt into the named values a spreadsheet row holds.
    /// The price becomes a number when it parses and stays text otherwise,
    /// so a value edited by hand into something odd is still written.
    pub fn to_row(&self, filename: impl Into<String>) -> ReceiptRow {
        let price = self.price.value().map(|raw| match NormalizedAmount::normalize(raw) {
            Ok(amount) => CellValue::Number(amount.as_decimal()),
            Err(_) => CellValue::Text(raw.to_string()),
        });
        ReceiptRow {
            filename: filename.into(),
            price,
            date: self.date.value.clone(),
            vendor: self.vendor.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(Decimal),
    Text(String),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One output row. Absent fields stay empty cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub filename: String,
    pub price: Option<CellValue>,
    pub date: Option<String>,
    pub vendor: Option<String>,
}

/// Persists receipt rows. Column layout and file format belong to the
/// implementation.
pub trait SpreadsheetWriter {
    type Error: std::error::Error;

    fn write_row(&mut self, row: &ReceiptRow, output: &Path) -> Result<(), Self::Error>;
}
