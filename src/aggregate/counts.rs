use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

use crate::aggregate::{group_rows, PERMIT_TYPE};
use crate::error::Result;
use crate::process::{utils::write_atomic, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "PERMIT_TYPE")]
    pub permit_type: String,
    pub count: usize,
}

/// Number of rows per permit type, most frequent first. Equal counts keep the
/// order in which the types first appear in `table`.
pub fn count_by_type(table: &Table) -> Result<Vec<TypeCount>> {
    let key = table.column(PERMIT_TYPE)?;
    let mut counts: Vec<TypeCount> = group_rows(table, key)
        .into_iter()
        .map(|(permit_type, rows)| TypeCount {
            permit_type: permit_type.to_string(),
            count: rows.len(),
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(counts)
}

pub fn write_counts(counts: &[TypeCount], path: &Path) -> Result<()> {
    write_atomic(path, |out| {
        let mut wtr = WriterBuilder::new().from_writer(out);
        for row in counts {
            wtr.serialize(row)?;
        }
        if counts.is_empty() {
            wtr.write_record([PERMIT_TYPE, "count"])?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Count permit types in the cleaned table at `clean` and write them to `out`.
#[instrument(level = "info", skip_all, fields(out = %out.display()))]
pub fn run(clean: &Path, out: &Path) -> Result<usize> {
    let table = Table::read_csv(clean)?;
    let counts = count_by_type(&table)?;
    write_counts(&counts, out)?;
    info!(types = counts.len(), rows = table.len(), "wrote permit counts");
    Ok(counts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::sample_table;
    use crate::error::PipelineError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn counts_sample_types() {
        let counts = count_by_type(&sample_table()).unwrap();
        assert_eq!(
            counts,
            vec![
                TypeCount {
                    permit_type: "PERMIT - EASY".into(),
                    count: 2
                },
                TypeCount {
                    permit_type: "PERMIT - RENOV".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn counts_cover_every_row_once() {
        let types = ["A", "B", "C", "B", "C", "C", "D", "A", "C"];
        let table = Table::new(
            vec!["ID".into(), PERMIT_TYPE.into()],
            types
                .iter()
                .enumerate()
                .map(|(i, t)| vec![i.to_string(), t.to_string()])
                .collect(),
        );
        let counts = count_by_type(&table).unwrap();

        let total: usize = counts.iter().map(|c| c.count).sum();
        assert_eq!(total, table.len());
        let names: Vec<_> = counts.iter().map(|c| c.permit_type.as_str()).collect();
        // C=4, then A and B tie at 2 in first-seen order, then D.
        assert_eq!(names, vec!["C", "A", "B", "D"]);
    }

    #[test]
    fn missing_permit_type_column_fails() {
        let table = Table::new(vec!["OTHER".into()], vec![vec!["x".into()]]);
        let err = count_by_type(&table).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn run_writes_header_and_counts() {
        let tmp = tempdir().unwrap();
        let clean = tmp.path().join("permits_clean.csv");
        let out = tmp.path().join("permit_counts.csv");
        sample_table().write_csv(&clean).unwrap();

        assert_eq!(run(&clean, &out).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "PERMIT_TYPE,count\nPERMIT - EASY,2\nPERMIT - RENOV,1\n"
        );
    }
}
