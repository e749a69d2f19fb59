// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure or a non-success HTTP status.
    #[error("GET {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed CSV in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("column `{column}` not found")]
    MissingColumn { column: String },

    #[error("writing CSV {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0}")]
    DataPolicyViolation(String),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stage graph contains a cycle through `{0}`")]
    CyclicGraph(Stage),

    #[error("blocking task did not complete")]
    Task {
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("stage `{stage}` failed")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PipelineError::Io { path, source }
    }

    /// The stage that failed, if this error has been attributed to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
