// src/process/mod.rs
use csv::{ReaderBuilder, WriterBuilder};
use std::{fs::File, io::Read, path::Path};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub mod clean;
pub mod utils;

pub use clean::{normalize, normalize_file};

/// An in-memory CSV table where every cell is kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names in file order.
    pub headers: Vec<String>,
    /// Data rows, one `String` per column.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` among the headers.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Cell at (`row`, `col`); a short row reads as empty.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    /// Read a headed CSV file. Every record must have as many fields as the header.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(PipelineError::io(path))?;
        let table = Self::from_reader(file, path)?;
        debug!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = table.len(),
            "read table"
        );
        Ok(table)
    }

    /// `origin` only labels parse errors.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let parse_err = |source| PipelineError::Parse {
            path: origin.to_path_buf(),
            source,
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(parse_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(parse_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Write the table (header first) to `path`, replacing it atomically.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        utils::write_atomic(path, |out| {
            let mut wtr = WriterBuilder::new().from_writer(out);
            wtr.write_record(&self.headers)?;
            for row in &self.rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
            Ok(())
        })
    }
}
