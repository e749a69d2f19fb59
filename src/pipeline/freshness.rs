use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::process::utils::write_atomic;

/// Whether a stage's output can be reused as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// No output on disk yet.
    Missing,
    /// Output exists but was built from other inputs or parameters.
    Stale,
    Fresh,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Missing => "missing",
            Freshness::Stale => "stale",
            Freshness::Fresh => "fresh",
        }
    }
}

/// An input file as it was when an output was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStamp {
    pub path: PathBuf,
    /// `(seconds, nanoseconds)` since the epoch; `None` if the file was absent.
    pub modified: Option<(u64, u32)>,
    /// Build time of the input, when the pipeline itself produced it.
    pub built_at_ns: Option<i64>,
}

/// What an output was built from: its inputs and the run parameters that
/// shape it. Stored next to the output as `<output>.source.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub inputs: Vec<InputStamp>,
    pub params: BTreeMap<String, String>,
}

impl Provenance {
    /// Stamp `inputs` as they are on disk right now.
    pub fn capture(inputs: &[PathBuf], params: BTreeMap<String, String>) -> Result<Self> {
        let inputs = inputs
            .iter()
            .map(|path| {
                Ok(InputStamp {
                    path: path.clone(),
                    modified: modified(path)?.map(epoch_parts),
                    built_at_ns: read_sidecar(path)?.map(|s| s.built_at_ns),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { inputs, params })
    }
}

/// On-disk form of a recorded [`Provenance`].
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    built_at_ns: i64,
    provenance: Provenance,
}

pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".source.json");
    PathBuf::from(name)
}

/// Persist `provenance` for `output`. Call only once `output` is fully written.
pub fn record(output: &Path, provenance: &Provenance) -> Result<()> {
    let sidecar = Sidecar {
        built_at_ns: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        provenance: provenance.clone(),
    };
    write_atomic(&sidecar_path(output), |out| {
        serde_json::to_writer_pretty(&mut *out, &sidecar).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
        Ok(())
    })
}

/// Fresh only if `output` exists and its recorded provenance equals `expected`.
/// A missing or unreadable sidecar makes an existing output stale.
pub fn check(output: &Path, expected: &Provenance) -> Result<Freshness> {
    if modified(output)?.is_none() {
        return Ok(Freshness::Missing);
    }

    let Some(recorded) = read_sidecar(output)? else {
        return Ok(Freshness::Stale);
    };

    if &recorded.provenance == expected {
        Ok(Freshness::Fresh)
    } else {
        debug!(output = %output.display(), "provenance changed");
        Ok(Freshness::Stale)
    }
}

/// Existence-only check, for outputs that have no inputs.
pub fn exists(output: &Path) -> Result<Freshness> {
    Ok(match modified(output)? {
        Some(_) => Freshness::Fresh,
        None => Freshness::Missing,
    })
}

/// `None` when `output` has no sidecar or it cannot be parsed.
fn read_sidecar(output: &Path) -> Result<Option<Sidecar>> {
    let path = sidecar_path(output);
    match fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(sidecar) => Ok(Some(sidecar)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unreadable provenance");
                Ok(None)
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::io(&path)(e)),
    }
}

fn epoch_parts(time: SystemTime) -> (u64, u32) {
    let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    (since.as_secs(), since.subsec_nanos())
}

fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some).map_err(PipelineError::io(path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::io(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, time::Duration};
    use tempfile::tempdir;

    fn touch(path: &Path, at: SystemTime) {
        fs::write(path, "x\n").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(at)
            .unwrap();
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_output() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out.csv");
        assert_eq!(check(&out, &Provenance::default()).unwrap(), Freshness::Missing);
        assert_eq!(exists(&out).unwrap(), Freshness::Missing);
    }

    #[test]
    fn recorded_provenance_is_fresh() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.csv");
        let out = tmp.path().join("out.csv");
        touch(&input, SystemTime::now() - Duration::from_secs(60));
        touch(&out, SystemTime::now());

        let prov = Provenance::capture(&[input.clone()], params(&[("top_n", "10")])).unwrap();
        record(&out, &prov).unwrap();

        let again = Provenance::capture(&[input], params(&[("top_n", "10")])).unwrap();
        assert_eq!(check(&out, &again).unwrap(), Freshness::Fresh);
    }

    #[test]
    fn output_without_sidecar_is_stale() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out.csv");
        touch(&out, SystemTime::now());
        assert_eq!(check(&out, &Provenance::default()).unwrap(), Freshness::Stale);
    }

    #[test]
    fn modified_input_is_stale() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("in.csv");
        let out = tmp.path().join("out.csv");
        touch(&input, SystemTime::now() - Duration::from_secs(60));
        touch(&out, SystemTime::now());
        record(&out, &Provenance::capture(&[input.clone()], params(&[])).unwrap()).unwrap();

        touch(&input, SystemTime::now());
        let now = Provenance::capture(&[input], params(&[])).unwrap();
        assert_eq!(check(&out, &now).unwrap(), Freshness::Stale);
    }

    #[test]
    fn older_input_from_another_path_is_stale() {
        let tmp = tempdir().unwrap();
        let day1 = tmp.path().join("permits-2016-01-01.csv");
        let day2 = tmp.path().join("permits-2016-01-02.csv");
        let out = tmp.path().join("permits_clean.csv");
        touch(&day1, SystemTime::now() - Duration::from_secs(120));
        touch(&day2, SystemTime::now() - Duration::from_secs(60));
        touch(&out, SystemTime::now());
        record(&out, &Provenance::capture(&[day2], params(&[])).unwrap()).unwrap();

        let want = Provenance::capture(&[day1], params(&[])).unwrap();
        assert_eq!(check(&out, &want).unwrap(), Freshness::Stale);
    }

    #[test]
    fn rebuilt_input_is_stale_even_with_same_mtime() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("permits_clean.csv");
        let out = tmp.path().join("permit_counts.csv");
        let at = SystemTime::now() - Duration::from_secs(60);
        touch(&input, at);
        record(&input, &Provenance::default()).unwrap();
        touch(&out, SystemTime::now());
        record(&out, &Provenance::capture(&[input.clone()], params(&[])).unwrap()).unwrap();

        std::thread::sleep(Duration::from_millis(2));
        touch(&input, at);
        record(&input, &Provenance::default()).unwrap();

        let now = Provenance::capture(&[input], params(&[])).unwrap();
        assert_eq!(check(&out, &now).unwrap(), Freshness::Stale);
    }

    #[test]
    fn changed_parameter_is_stale() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("top.csv");
        touch(&out, SystemTime::now());
        record(&out, &Provenance::capture(&[], params(&[("top_n", "10")])).unwrap()).unwrap();

        let want = Provenance::capture(&[], params(&[("top_n", "1")])).unwrap();
        assert_eq!(check(&out, &want).unwrap(), Freshness::Stale);
    }

    #[test]
    fn corrupt_sidecar_is_stale() {
        let tmp = tempdir().unwrap();
        let out = tmp.path().join("out.csv");
        touch(&out, SystemTime::now());
        fs::write(sidecar_path(&out), "not json").unwrap();
        assert_eq!(check(&out, &Provenance::default()).unwrap(), Freshness::Stale);
    }
}
