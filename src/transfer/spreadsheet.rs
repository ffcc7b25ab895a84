use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;

use super::error::TransferError;
use super::{normalize_cell, TabularData};

/// Worksheet names are limited to 31 characters
const MAX_SHEET_NAME: usize = 31;

/// Read the first worksheet of an .xlsx/.xls workbook
pub fn parse(bytes: Vec<u8>) -> Result<TabularData, TransferError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| TransferError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(TransferError::EmptyFile)?
        .map_err(|e| TransferError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(TransferError::EmptyFile)?
        .iter()
        .map(|cell| cell_text(cell).unwrap_or_default())
        .collect();

    let rows = rows.map(|row| row.iter().map(cell_text).collect()).collect();

    TabularData::new(headers, rows)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => normalize_cell(s),
        // Whole numbers come back as floats; drop the trailing ".0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        other => normalize_cell(&other.to_string()),
    }
}

/// Single-sheet workbook named after the table
pub fn write(sheet_name: &str, headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, TransferError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let name: String = sheet_name.chars().take(MAX_SHEET_NAME).collect();
    if !name.is_empty() {
        worksheet.set_name(&name)?;
    }

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(r as u32 + 1, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_workbook_reads_back() {
        let headers = vec!["name".to_string(), "age".to_string()];
        let rows = vec![
            vec!["Ann".to_string(), "31".to_string()],
            vec!["Bob".to_string(), String::new()],
        ];
        let bytes = write("people", &headers, &rows).unwrap();

        let data = parse(bytes).unwrap();
        assert_eq!(data.headers, headers);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0], vec![Some("Ann".to_string()), Some("31".to_string())]);
        assert_eq!(data.rows[1][0].as_deref(), Some("Bob"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse(b"not a workbook".to_vec()), Err(TransferError::Spreadsheet(_))));
    }
}
