// src/process/clean.rs
use std::path::Path;
use tracing::{info, instrument};

use crate::error::Result;
use crate::process::Table;

pub const CURRENCY_SYMBOL: char = '$';

/// Header names lose surrounding whitespace.
pub fn clean_header(raw: &str) -> String {
    raw.trim().to_string()
}

/// Drop every currency symbol, wherever it sits in the cell.
pub fn strip_currency(raw: &str) -> String {
    raw.replace(CURRENCY_SYMBOL, "")
}

/// Trim headers and strip currency symbols from every cell. Cells stay text.
pub fn normalize(raw: &Table) -> Table {
    Table {
        headers: raw.headers.iter().map(|h| clean_header(h)).collect(),
        rows: raw
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| strip_currency(cell)).collect())
            .collect(),
    }
}

/// Read the raw snapshot at `raw_path`, normalize it and overwrite `clean_path`.
/// Returns the number of data rows written.
#[instrument(level = "info", skip_all, fields(raw = %raw_path.display()))]
pub fn normalize_file(raw_path: &Path, clean_path: &Path) -> Result<usize> {
    let raw = Table::read_csv(raw_path)?;
    let cleaned = normalize(&raw);
    cleaned.write_csv(clean_path)?;
    info!(
        rows = cleaned.len(),
        out = %clean_path.display(),
        "wrote cleaned table"
    );
    Ok(cleaned.len())
}
