use crate::error::{ChartError, ChartResult};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

/// Column-name-indexed table of raw string cells.
///
/// Every transform produces a new `CsvData`; nothing mutates a loaded table in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvData {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        CsvData { headers, rows }
    }

    /// Position of a column. Names match exactly once surrounding whitespace is trimmed.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, name: &str) -> ChartResult<usize> {
        self.column_index(name).ok_or_else(|| ChartError::MissingColumns {
            missing: vec![name.to_string()],
        })
    }

    /// Cell text, or the empty string when a row is shorter than the header.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> ChartResult<()> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Read a headed CSV table; surrounding whitespace in column names is dropped.
pub fn read_csv<R: Read>(source: R) -> ChartResult<CsvData> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        rows.push(row);
    }

    debug!(columns = headers.len(), rows = rows.len(), "loaded csv table");
    Ok(CsvData { headers, rows })
}

pub fn read_csv_file(path: &Path) -> ChartResult<CsvData> {
    let file = File::open(path)?;
    read_csv(file)
}

/// Uploaded file contents arrive as bytes.
pub fn read_csv_bytes(bytes: &[u8]) -> ChartResult<CsvData> {
    read_csv(bytes)
}

pub fn read_csv_from_stdin() -> ChartResult<CsvData> {
    read_csv(io::stdin())
}
