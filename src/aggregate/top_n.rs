use csv::WriterBuilder;
use serde::Serialize;
use std::{cmp::Ordering, fmt, num::NonZeroUsize, path::Path};
use tracing::{debug, info, instrument};

use crate::aggregate::AMOUNT_PAID;
use crate::error::{PipelineError, Result};
use crate::process::{
    utils::{parse_number, write_atomic},
    Table,
};

/// How many rows to keep. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TopN(NonZeroUsize);

impl TopN {
    pub const DEFAULT: TopN = TopN(match NonZeroUsize::new(10) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Rejects zero and negative counts.
    pub fn new(n: i64) -> Result<Self> {
        usize::try_from(n)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(TopN)
            .ok_or_else(|| {
                PipelineError::DataPolicyViolation(format!(
                    "top_n must be a positive integer, got {n}"
                ))
            })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for TopN {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TopN {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row copied out of the cleaned table with its position there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRow {
    pub index: usize,
    pub cells: Vec<String>,
}

/// The `n` rows with the largest amount paid, largest first.
///
/// `n` is clamped to the table size. The sort is stable, and rows whose amount
/// is not a number rank below every row that has one.
pub fn top_by_amount(table: &Table, n: TopN) -> Result<Vec<RankedRow>> {
    let amount = table.column(AMOUNT_PAID)?;
    let keep = n.get().min(table.len());
    if keep < n.get() {
        debug!(requested = n.get(), rows = table.len(), "top_n clamped to table size");
    }

    let mut ranked: Vec<(usize, Option<f64>)> = (0..table.len())
        .map(|row| (row, parse_number(table.cell(row, amount))))
        .collect();
    ranked.sort_by(|a, b| by_amount_desc(a.1, b.1));

    Ok(ranked
        .into_iter()
        .take(keep)
        .map(|(index, _)| RankedRow {
            index,
            cells: table.rows[index].clone(),
        })
        .collect())
}

fn by_amount_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The first column is unnamed and holds the original row index.
pub fn write_ranked(headers: &[String], rows: &[RankedRow], path: &Path) -> Result<()> {
    write_atomic(path, |out| {
        let mut wtr = WriterBuilder::new().from_writer(out);
        wtr.write_record(std::iter::once("").chain(headers.iter().map(String::as_str)))?;
        for row in rows {
            let index = row.index.to_string();
            wtr.write_record(
                std::iter::once(index.as_str()).chain(row.cells.iter().map(String::as_str)),
            )?;
        }
        wtr.flush()?;
        Ok(())
    })
}

#[instrument(level = "info", skip_all, fields(n = %n, out = %out.display()))]
pub fn run(clean: &Path, out: &Path, n: TopN) -> Result<usize> {
    let table = Table::read_csv(clean)?;
    let top = top_by_amount(&table, n)?;
    write_ranked(&table.headers, &top, out)?;
    info!(rows = top.len(), "wrote top permits by amount paid");
    Ok(top.len())
}
