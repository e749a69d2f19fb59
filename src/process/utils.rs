use std::{
    io::{BufWriter, Write},
    path::Path,
};
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

/// Parse a cleaned numeric cell. Surrounding whitespace and `,` group
/// separators are ignored; anything else that is not a finite number is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Write `dest` through a temp file in the same directory, then rename over it.
/// On any error the previous contents of `dest` (if any) are left in place.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> csv::Result<()>,
{
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let tmp = NamedTempFile::new_in(dir).map_err(PipelineError::io(dir))?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        write(&mut out).map_err(|source| PipelineError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        out.flush().map_err(PipelineError::io(dest))?;
    }
    tmp.persist(dest)
        .map_err(|e| PipelineError::io(dest)(e.error))?;
    Ok(())
}
