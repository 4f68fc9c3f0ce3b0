//! CSV reading and writing.
//!
//! The reader strips a leading UTF-8 byte-order mark, trims header names and
//! drops any data row whose column count differs from the header. Cells are
//! kept byte-for-byte so that an unmodified export re-imports unchanged.
//! Bytes that are not valid UTF-8 (a Windows-1252 export, say) are replaced
//! with U+FFFD rather than failing the file.
//! The writer emits a byte-order mark for spreadsheet compatibility.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One data row: column name to raw cell, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    /// Builds a row from `(column, cell)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the raw cell of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the trimmed cell of a column, or `None` when absent or blank.
    #[must_use]
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Iterates `(column, cell)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renames columns in place; each column is looked up once.
    pub fn remap(&mut self, mapping: &BTreeMap<String, String>) {
        for (name, _) in &mut self.fields {
            if let Some(to) = mapping.get(name.as_str()) {
                name.clone_from(to);
            }
        }
    }

    /// Returns the number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed CSV file.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    /// Header names, in file order.
    pub headers: Vec<String>,
    /// Data rows whose width matched the header.
    pub rows: Vec<CsvRow>,
    /// Number of rows dropped for a column-count mismatch.
    pub dropped: usize,
}

impl CsvTable {
    /// Builds a table from headers and cell vectors.
    ///
    /// Rows whose width differs from the header are dropped and counted.
    #[must_use]
    pub fn from_cells(headers: Vec<String>, cells: Vec<Vec<String>>) -> Self {
        let mut table = Self {
            headers,
            ..Self::default()
        };
        for row in cells {
            if row.len() == table.headers.len() {
                table
                    .rows
                    .push(CsvRow::from_pairs(table.headers.iter().cloned().zip(row)));
            } else {
                table.dropped += 1;
            }
        }
        table
    }

    /// Renames columns in the header and every row.
    ///
    /// Every source header maps at most once, so `a -> b` together with
    /// `b -> c` moves the original `b` column to `c` without chaining the
    /// original `a` column along with it.
    pub fn apply_mapping(&mut self, mapping: &BTreeMap<String, String>) {
        if mapping.is_empty() {
            return;
        }
        for header in &mut self.headers {
            if let Some(to) = mapping.get(header.as_str()) {
                header.clone_from(to);
            }
        }
        for row in &mut self.rows {
            row.remap(mapping);
        }
    }
}

/// Reads a CSV file from disk.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the file cannot be read, or
/// [`Error::InvalidInput`] if it has no header row.
pub fn read_csv_file(path: &Path) -> Result<CsvTable> {
    let file = std::fs::File::open(path).map_err(|e| Error::OperationFailed {
        operation: "open_csv_file".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    read_csv(file)
}

/// Reads CSV data from any reader.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] on I/O or parse failure, or
/// [`Error::InvalidInput`] if there is no header row.
pub fn read_csv<R: Read>(mut reader: R) -> Result<CsvTable> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::OperationFailed {
            operation: "read_csv".to_string(),
            cause: e.to_string(),
        })?;
    let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Mismatched rows are filtered below, not rejected
        .from_reader(data);

    let headers: Vec<String> = csv_reader
        .byte_headers()
        .map_err(|e| Error::OperationFailed {
            operation: "read_csv_headers".to_string(),
            cause: e.to_string(),
        })?
        .iter()
        .map(|h| decode_cell(h).trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::InvalidInput("CSV file has no header row".to_string()));
    }

    let mut cells = Vec::new();
    let mut lossy_rows = 0usize;
    for record in csv_reader.byte_records() {
        let record = record.map_err(|e| Error::OperationFailed {
            operation: "read_csv_record".to_string(),
            cause: e.to_string(),
        })?;
        if std::str::from_utf8(record.as_slice()).is_err() {
            lossy_rows += 1;
        }
        cells.push(record.iter().map(decode_cell).collect());
    }
    if lossy_rows > 0 {
        tracing::warn!(
            rows = lossy_rows,
            "CSV rows contain bytes that are not valid UTF-8; replaced with U+FFFD"
        );
    }

    let table = CsvTable::from_cells(headers, cells);
    if table.dropped > 0 {
        tracing::warn!(
            dropped = table.dropped,
            "Dropped CSV rows with a column count different from the header"
        );
    }
    Ok(table)
}

fn decode_cell(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Writes a CSV document with a UTF-8 byte-order mark.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if writing fails.
pub fn write_csv<W: Write>(mut writer: W, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    writer
        .write_all(UTF8_BOM)
        .map_err(|e| Error::OperationFailed {
            operation: "write_csv_bom".to_string(),
            cause: e.to_string(),
        })?;

    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer
        .write_record(headers)
        .map_err(|e| Error::OperationFailed {
            operation: "write_csv_header".to_string(),
            cause: e.to_string(),
        })?;
    for row in rows {
        csv_writer
            .write_record(row)
            .map_err(|e| Error::OperationFailed {
                operation: "write_csv_record".to_string(),
                cause: e.to_string(),
            })?;
    }
    csv_writer.flush().map_err(|e| Error::OperationFailed {
        operation: "flush_csv".to_string(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_strips_bom_and_trims_headers() {
        let data = "\u{feff}ID , post_title\n1,Hello\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["ID", "post_title"]);
        assert_eq!(table.rows[0].get("post_title"), Some("Hello"));
    }

    #[test]
    fn test_read_drops_mismatched_rows() {
        let data = "ID,post_title\n1,A\n2\n3,C,extra\n4,D\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.dropped, 2);
        assert_eq!(table.rows[1].get("ID"), Some("4"));
    }

    #[test]
    fn test_read_preserves_cell_whitespace() {
        let data = "post_title,post_content\nA,\"  indented\nsecond line  \"\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(
            table.rows[0].get("post_content"),
            Some("  indented\nsecond line  ")
        );
        assert_eq!(table.rows[0].non_empty("post_content"), Some("indented\nsecond line"));
    }

    #[test]
    fn test_read_empty_input_is_invalid() {
        assert!(read_csv("".as_bytes()).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let headers = vec!["ID".to_string(), "post_title".to_string()];
        let rows = vec![vec!["1".to_string(), "Comma, quoted \"title\"".to_string()]];
        let mut out = Vec::new();
        write_csv(&mut out, &headers, &rows).unwrap();
        assert!(out.starts_with(UTF8_BOM));

        let table = read_csv(out.as_slice()).unwrap();
        assert_eq!(table.headers, headers);
        assert_eq!(
            table.rows[0].get("post_title"),
            Some("Comma, quoted \"title\"")
        );
    }

    fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect()
    }

    #[test]
    fn test_apply_mapping() {
        let mut table = CsvTable::from_cells(
            vec!["title".to_string()],
            vec![vec!["Hello".to_string()]],
        );
        table.apply_mapping(&mapping(&[("title", "post_title")]));
        assert_eq!(table.headers, vec!["post_title"]);
        assert_eq!(table.rows[0].get("post_title"), Some("Hello"));
    }

    #[test]
    fn test_apply_mapping_does_not_chain() {
        let mut table = read_csv(
            "post_title,Summary,post_content\nT,new body,short excerpt\n".as_bytes(),
        )
        .unwrap();
        table.apply_mapping(&mapping(&[
            ("Summary", "post_content"),
            ("post_content", "post_excerpt"),
        ]));
        assert_eq!(table.headers, vec!["post_title", "post_content", "post_excerpt"]);
        let row = &table.rows[0];
        assert_eq!(row.get("post_content"), Some("new body"));
        assert_eq!(row.get("post_excerpt"), Some("short excerpt"));
    }

    #[test]
    fn test_apply_mapping_swaps_columns() {
        let mut table = read_csv("a,b\n1,2\n".as_bytes()).unwrap();
        table.apply_mapping(&mapping(&[("a", "b"), ("b", "a")]));
        assert_eq!(table.headers, vec!["b", "a"]);
        assert_eq!(table.rows[0].get("a"), Some("2"));
        assert_eq!(table.rows[0].get("b"), Some("1"));
    }

    #[test]
    fn test_read_non_utf8_cell_is_decoded_lossily() {
        // "Caf\xe9" as exported by a Windows-1252 spreadsheet
        let data = b"post_title,post_type\nCaf\xe9,post\nPlain,post\n";
        let table = read_csv(&data[..]).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("post_title"), Some("Caf\u{fffd}"));
        assert_eq!(table.rows[1].get("post_title"), Some("Plain"));
    }
}
