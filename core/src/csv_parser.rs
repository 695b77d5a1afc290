//! CSV tokenizer.
//!
//! The first non-blank record is the header row; every later record becomes a
//! [`CsvRow`] keyed by header. Quoted fields may contain the delimiter and use
//! `""` for a literal quote. All values are trimmed.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use rimport_types::{CsvRow, CsvTable};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CSV record {record}: {source}")]
    Parse { record: usize, source: csv::Error },
}

/// CSV parser configuration.
#[derive(Debug, Clone, Copy)]
pub struct CsvReader {
    delimiter: u8,
}

impl Default for CsvReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read and parse a file, decoding UTF-8 (with or without BOM), UTF-16 with
    /// BOM, or falling back to Windows-1252 for legacy spreadsheet exports.
    pub fn read_file(&self, path: &Path) -> Result<CsvTable, CsvError> {
        let bytes = fs::read(path).map_err(|source| CsvError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, encoding) = decode(&bytes);
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            encoding = encoding.name(),
            "Decoded CSV file"
        );
        self.parse_str(&text)
    }

    /// Parse CSV text into a table.
    ///
    /// Fewer than two non-blank records (no header or no data) yields a table
    /// with no rows rather than an error.
    pub fn parse_str(&self, content: &str) -> Result<CsvTable, CsvError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let mut records = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|source| CsvError::Parse {
                record: index + 1,
                source,
            })?;
            if is_blank(&record, self.delimiter) {
                continue;
            }
            records.push(record);
        }

        let mut records = records.into_iter();
        let Some(header_record) = records.next() else {
            return Ok(CsvTable::default());
        };
        let headers: Vec<String> = header_record.iter().map(str::to_string).collect();
        let rows: Vec<CsvRow> = records.map(|record| build_row(&headers, &record)).collect();

        tracing::debug!(
            headers = headers.len(),
            rows = rows.len(),
            "Parsed CSV content"
        );
        Ok(CsvTable { headers, rows })
    }
}

/// A line holding nothing but whitespace. With a whitespace delimiter such as
/// tab, a line of bare delimiters is whitespace too.
fn is_blank(record: &StringRecord, delimiter: u8) -> bool {
    let all_empty = record.iter().all(str::is_empty);
    all_empty && (record.len() <= 1 || delimiter.is_ascii_whitespace())
}

fn build_row(headers: &[String], record: &StringRecord) -> CsvRow {
    let mut row = CsvRow::new();
    for (index, header) in headers.iter().enumerate() {
        row.insert(header.as_str(), record.get(index).unwrap_or(""));
    }
    row
}

fn decode(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text, encoding);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), UTF_8),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, WINDOWS_1252)
        }
    }
}
