use reqwest::Client;
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};
use tokio::time::Instant;
use tracing::{error, info};

use crate::aggregate::{counts, mean_price, top_n};
use crate::error::{PipelineError, Result};
use crate::fetch::{build_client, download_permits};
use crate::layout::DataLayout;
use crate::pipeline::{
    freshness::{self, Provenance},
    Freshness, PipelineConfig, Stage, StageGraph,
};
use crate::process::normalize_file;

/// What a call to [`Pipeline::run`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub executed: Vec<Stage>,
    pub skipped: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub output: Option<PathBuf>,
    pub freshness: Freshness,
}

/// Runs stages in dependency order, skipping those whose output is fresh.
pub struct Pipeline {
    config: PipelineConfig,
    layout: DataLayout,
    graph: StageGraph,
    client: Client,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = build_client().map_err(|source| PipelineError::Network {
            url: config.url.to_string(),
            source,
        })?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: PipelineConfig, client: Client) -> Self {
        Self {
            layout: DataLayout::new(&config.data_dir),
            config,
            graph: StageGraph::new(),
            client,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// The file `stage` produces; `None` for stages without an artifact.
    pub fn output(&self, stage: Stage) -> Option<PathBuf> {
        match stage {
            Stage::Fetch => Some(self.layout.raw(self.config.date)),
            Stage::Normalize => Some(self.layout.clean()),
            Stage::CountsByType => Some(self.layout.counts()),
            Stage::MeanPriceByType => Some(self.layout.mean_price()),
            Stage::TopNByAmount => Some(self.layout.top_n()),
            Stage::Orchestrate => None,
        }
    }

    pub fn inputs(&self, stage: Stage) -> Vec<PathBuf> {
        stage
            .requires()
            .iter()
            .filter_map(|dep| self.output(*dep))
            .collect()
    }

    /// Run parameters that change what `stage` writes, beyond its inputs.
    fn params(&self, stage: Stage) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        if stage == Stage::TopNByAmount {
            params.insert("top_n".to_string(), self.config.top_n.to_string());
        }
        params
    }

    /// What `stage`'s output must have been built from to be reusable now.
    /// `None` for stages that read nothing; their output only has to exist.
    pub fn provenance(&self, stage: Stage) -> Result<Option<Provenance>> {
        if stage.requires().is_empty() {
            return Ok(None);
        }
        Provenance::capture(&self.inputs(stage), self.params(stage)).map(Some)
    }

    /// A stage without an artifact is as fresh as its least fresh dependency.
    pub fn freshness(&self, stage: Stage) -> Result<Freshness> {
        if let Some(out) = self.output(stage) {
            return match self.provenance(stage)? {
                Some(expected) => freshness::check(&out, &expected),
                None => freshness::exists(&out),
            };
        }
        let mut worst = Freshness::Fresh;
        for dep in stage.requires() {
            match self.freshness(*dep)? {
                Freshness::Missing => return Ok(Freshness::Missing),
                Freshness::Stale => worst = Freshness::Stale,
                Freshness::Fresh => {}
            }
        }
        Ok(worst)
    }

    /// Freshness of every stage `target` needs, in execution order.
    pub fn status(&self, target: Stage) -> Result<Vec<StageReport>> {
        self.graph
            .plan(target)?
            .into_iter()
            .map(|stage| {
                Ok(StageReport {
                    stage,
                    output: self.output(stage),
                    freshness: self.freshness(stage)?,
                })
            })
            .collect()
    }

    /// Bring `target` up to date. Stops at the first failing stage.
    pub async fn run(&self, target: Stage) -> Result<RunReport> {
        self.layout.ensure()?;
        let plan = self.graph.plan(target)?;
        info!(
            target = %target,
            date = %self.config.date,
            top_n = %self.config.top_n,
            stages = plan.len(),
            "starting pipeline"
        );

        let mut report = RunReport::default();
        for stage in plan {
            if self.output(stage).is_some() {
                let state = self.freshness(stage)?;
                if state.is_fresh() {
                    info!(stage = %stage, "output fresh; skipping");
                    report.skipped.push(stage);
                    continue;
                }
                info!(stage = %stage, state = state.as_str(), "running");
            }

            let start = Instant::now();
            if let Err(e) = self.execute(stage).await {
                error!(stage = %stage, error = %e, "stage failed");
                return Err(PipelineError::StageFailed {
                    stage,
                    source: Box::new(e),
                });
            }
            if let (Some(out), Some(provenance)) = (self.output(stage), self.provenance(stage)?) {
                freshness::record(&out, &provenance)?;
            }
            info!(stage = %stage, elapsed = ?start.elapsed(), "stage done");
            report.executed.push(stage);
        }
        Ok(report)
    }

    async fn execute(&self, stage: Stage) -> Result<()> {
        let clean = self.layout.clean();
        match stage {
            Stage::Fetch => {
                let dest = self.layout.raw(self.config.date);
                download_permits(&self.client, &self.config.url, &dest).await?;
            }
            Stage::Normalize => {
                let raw = self.layout.raw(self.config.date);
                blocking(move || normalize_file(&raw, &clean)).await?;
            }
            Stage::CountsByType => {
                let out = self.layout.counts();
                blocking(move || counts::run(&clean, &out)).await?;
            }
            Stage::MeanPriceByType => {
                let out = self.layout.mean_price();
                blocking(move || mean_price::run(&clean, &out)).await?;
            }
            Stage::TopNByAmount => {
                let out = self.layout.top_n();
                let n = self.config.top_n;
                blocking(move || top_n::run(&clean, &out, n)).await?;
            }
            Stage::Orchestrate => {
                info!("all aggregates up to date");
            }
        }
        Ok(())
    }
}

/// Run CSV work on the blocking pool.
async fn blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|source| PipelineError::Task { source })?
}
