use std::io::Write;

use super::error::TransferError;
use super::{normalize_cell, TabularData};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse CSV bytes; the first record is the header row
pub fn parse(bytes: &[u8]) -> Result<TabularData, TransferError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(TransferError::EmptyFile);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(normalize_cell).collect());
    }

    TabularData::new(headers, rows)
}

/// CSV with a leading byte-order mark so spreadsheet tools detect UTF-8
pub fn write(headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, TransferError> {
    let mut buffer = Vec::new();
    buffer.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(buffer);
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| TransferError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_bom_and_blank_cells() {
        let input = b"\xEF\xBB\xBFname,age\nAnn,31\nBob,\n\n,\nCid,7\n";
        let data = parse(input).unwrap();
        assert_eq!(data.headers, vec!["name", "age"]);
        // Empty lines are not records; a line of bare separators is an all-NULL row
        assert_eq!(data.rows.len(), 4);
        assert_eq!(data.rows[1], vec![Some("Bob".to_string()), None]);
        assert_eq!(data.rows[2], vec![None, None]);
    }

    #[test]
    fn short_rows_are_kept() {
        let data = parse(b"a,b,c\n1\n").unwrap();
        assert_eq!(data.rows[0], vec![Some("1".to_string())]);
    }

    #[test]
    fn writes_bom_and_quotes() {
        let out = write(
            &["name".to_string(), "note".to_string()],
            &[vec!["Ann".to_string(), "a, b".to_string()]],
        )
        .unwrap();
        assert!(out.starts_with(UTF8_BOM));
        let text = String::from_utf8(out[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "name,note\nAnn,\"a, b\"\n");
    }
}
