// src/pipeline/mod.rs
//! Named stages, their dependency graph and the executor that walks it.

use chrono::NaiveDate;
use std::path::PathBuf;
use url::Url;

use crate::aggregate::TopN;
use crate::fetch::DEFAULT_PERMITS_URL;

pub mod freshness;
pub mod graph;
pub mod runner;
pub mod stage;

pub use freshness::Freshness;
pub use graph::StageGraph;
pub use runner::{Pipeline, RunReport, StageReport};
pub use stage::Stage;

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    /// Day whose snapshot is fetched and cleaned.
    pub date: NaiveDate,
    pub url: Url,
    pub top_n: TopN,
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            data_dir: data_dir.into(),
            date,
            url: Url::parse(DEFAULT_PERMITS_URL).expect("default permits URL is valid"),
            top_n: TopN::default(),
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub fn with_top_n(mut self, top_n: TopN) -> Self {
        self.top_n = top_n;
        self
    }
}
