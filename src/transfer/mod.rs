//! Import and export of whole tables as CSV or spreadsheet files.

pub mod delimited;
pub mod error;
pub mod spreadsheet;

pub use error::TransferError;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::database::query_builder::SURROGATE_KEY;

/// Header row plus data rows; `None` marks a blank cell
#[derive(Debug, Clone, PartialEq)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl TabularData {
    /// Name blank headers `column_{n}`, reject duplicates and the surrogate key
    /// name. Rows whose cells are all blank are kept as all-NULL rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self, TransferError> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(TransferError::EmptyFile);
        }

        let mut seen = HashSet::new();
        let mut named = Vec::with_capacity(headers.len());
        for (index, header) in headers.into_iter().enumerate() {
            let header = header.trim();
            let header = if header.is_empty() {
                format!("column_{}", index + 1)
            } else {
                header.to_string()
            };

            if header.eq_ignore_ascii_case(SURROGATE_KEY) {
                return Err(TransferError::InvalidHeader(format!(
                    "'{}' is reserved for the generated key column",
                    header
                )));
            }
            // SQLite column names are case-insensitive
            if !seen.insert(header.to_lowercase()) {
                return Err(TransferError::InvalidHeader(format!("duplicate column '{}'", header)));
            }
            named.push(header);
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.truncate(named.len());
                row
            })
            .collect();

        Ok(Self { headers: named, rows })
    }
}

pub(crate) fn normalize_cell(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Spreadsheet,
}

impl ImportFormat {
    /// Chosen by file extension: `.csv`, `.xlsx` or `.xls`
    pub fn from_filename(filename: &str) -> Result<Self, TransferError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(ImportFormat::Csv),
            "xlsx" | "xls" => Ok(ImportFormat::Spreadsheet),
            _ => Err(TransferError::UnsupportedFormat(filename.to_string())),
        }
    }

    pub fn parse(self, bytes: Vec<u8>) -> Result<TabularData, TransferError> {
        match self {
            ImportFormat::Csv => delimited::parse(&bytes),
            ImportFormat::Spreadsheet => spreadsheet::parse(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Result<Self, TransferError> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            other => Err(TransferError::UnsupportedExportFormat(other.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    /// `{table}_{YYYYmmdd_HHMMSS}.{ext}`
    pub fn filename(&self, table: &str, at: DateTime<Utc>) -> String {
        format!("{}_{}.{}", table, at.format("%Y%m%d_%H%M%S"), self.extension())
    }
}

/// Serialized export file
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render rows in `headers` order; NULL becomes an empty cell
pub fn render(
    format: ExportFormat,
    table: &str,
    headers: &[String],
    rows: &[Map<String, Value>],
) -> Result<ExportFile, TransferError> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| headers.iter().map(|h| cell_string(row.get(h))).collect())
        .collect();

    let bytes = match format {
        ExportFormat::Csv => delimited::write(headers, &cells)?,
        ExportFormat::Excel => spreadsheet::write(table, headers, &cells)?,
    };

    Ok(ExportFile {
        filename: format.filename(table, Utc::now()),
        content_type: format.content_type(),
        bytes,
    })
}

fn cell_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
