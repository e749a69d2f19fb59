// src/layout.rs
use chrono::NaiveDate;
use glob::{glob, Pattern};
use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::error::{PipelineError, Result};

const RAW_PREFIX: &str = "permits-";
pub const CLEAN_FILE: &str = "permits_clean.csv";
pub const COUNTS_FILE: &str = "permit_counts.csv";
pub const MEAN_PRICE_FILE: &str = "mean_permit_price.csv";
/// Fixed name, whatever N the run used.
pub const TOP_N_FILE: &str = "top_10_permits.csv";

/// File locations of every pipeline artifact under one data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(PipelineError::io(&self.root))
    }

    /// `permits-<YYYY-MM-DD>.csv`
    pub fn raw(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{}{}.csv", RAW_PREFIX, date.format("%Y-%m-%d")))
    }

    pub fn clean(&self) -> PathBuf {
        self.root.join(CLEAN_FILE)
    }

    pub fn counts(&self) -> PathBuf {
        self.root.join(COUNTS_FILE)
    }

    pub fn mean_price(&self) -> PathBuf {
        self.root.join(MEAN_PRICE_FILE)
    }

    pub fn top_n(&self) -> PathBuf {
        self.root.join(TOP_N_FILE)
    }

    /// Every raw snapshot kept on disk, oldest first. Files whose name does not
    /// carry a valid date are ignored.
    pub fn raw_snapshots(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let pattern = format!(
            "{}/{}*.csv",
            Pattern::escape(&self.root.to_string_lossy()),
            RAW_PREFIX
        );
        let entries = glob(&pattern).map_err(|e| PipelineError::Io {
            path: self.root.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::Io {
                path: e.path().to_path_buf(),
                source: e.into(),
            })?;
            if let Some(date) = snapshot_date(&path) {
                out.push((date, path));
            }
        }
        out.sort();
        Ok(out)
    }
}

fn snapshot_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let date = stem.strip_prefix(RAW_PREFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn raw_name_is_date_keyed() {
        let layout = DataLayout::new("data");
        let date = NaiveDate::from_ymd_opt(2016, 3, 7).unwrap();
        assert_eq!(layout.raw(date), PathBuf::from("data/permits-2016-03-07.csv"));
        assert_eq!(layout.clean(), PathBuf::from("data/permits_clean.csv"));
        assert_eq!(layout.top_n(), PathBuf::from("data/top_10_permits.csv"));
    }

    #[test]
    fn raw_snapshots_skips_unrelated_files() {
        let tmp = tempdir().unwrap();
        let layout = DataLayout::new(tmp.path());
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        fs::write(layout.raw(d1), "a\n").unwrap();
        fs::write(layout.raw(d2), "a\n").unwrap();
        fs::write(layout.clean(), "a\n").unwrap();
        fs::write(tmp.path().join("permits-latest.csv"), "a\n").unwrap();

        let snaps = layout.raw_snapshots().unwrap();
        let dates: Vec<_> = snaps.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![d2, d1]);
    }
}
