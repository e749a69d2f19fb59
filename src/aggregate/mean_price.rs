use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{group_rows, ESTIMATED_COST, PERMIT_TYPE};
use crate::error::Result;
use crate::process::{
    utils::{parse_number, write_atomic},
    Table,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeMean {
    #[serde(rename = "PERMIT_TYPE")]
    pub permit_type: String,
    #[serde(rename = "ESTIMATED_COST")]
    pub mean: f64,
}

/// Mean estimated cost per permit type, highest first.
///
/// Costs that do not parse as numbers are left out of their group's mean
/// rather than counted as zero. A type with no parseable cost at all has no
/// mean and is dropped from the result.
pub fn mean_price_by_type(table: &Table) -> Result<Vec<TypeMean>> {
    let key = table.column(PERMIT_TYPE)?;
    let cost = table.column(ESTIMATED_COST)?;

    let mut means = Vec::new();
    for (permit_type, rows) in group_rows(table, key) {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|&row| parse_number(table.cell(row, cost)))
            .collect();

        let skipped = rows.len() - values.len();
        if skipped > 0 {
            debug!(permit_type, skipped, "ignoring non-numeric costs");
        }
        if values.is_empty() {
            warn!(permit_type, rows = rows.len(), "no numeric cost; type omitted");
            continue;
        }

        means.push(TypeMean {
            permit_type: permit_type.to_string(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
        });
    }

    means.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    Ok(means)
}

pub fn write_means(means: &[TypeMean], path: &Path) -> Result<()> {
    write_atomic(path, |out| {
        let mut wtr = WriterBuilder::new().from_writer(out);
        for row in means {
            wtr.serialize(row)?;
        }
        if means.is_empty() {
            wtr.write_record([PERMIT_TYPE, ESTIMATED_COST])?;
        }
        wtr.flush()?;
        Ok(())
    })
}

#[instrument(level = "info", skip_all, fields(out = %out.display()))]
pub fn run(clean: &Path, out: &Path) -> Result<usize> {
    let table = Table::read_csv(clean)?;
    let means = mean_price_by_type(&table)?;
    write_means(&means, out)?;
    info!(types = means.len(), "wrote mean permit price");
    Ok(means.len())
}
