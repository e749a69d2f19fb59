use serde::Serialize;
use std::{fmt, str::FromStr};

/// A node of the pipeline graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Normalize,
    CountsByType,
    MeanPriceByType,
    TopNByAmount,
    Orchestrate,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Fetch,
        Stage::Normalize,
        Stage::CountsByType,
        Stage::MeanPriceByType,
        Stage::TopNByAmount,
        Stage::Orchestrate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::CountsByType => "counts_by_type",
            Stage::MeanPriceByType => "mean_price_by_type",
            Stage::TopNByAmount => "top_n_by_amount",
            Stage::Orchestrate => "orchestrate",
        }
    }

    /// Stages whose outputs this one reads.
    pub fn requires(&self) -> &'static [Stage] {
        match self {
            Stage::Fetch => &[],
            Stage::Normalize => &[Stage::Fetch],
            Stage::CountsByType | Stage::MeanPriceByType | Stage::TopNByAmount => {
                &[Stage::Normalize]
            }
            Stage::Orchestrate => &[
                Stage::TopNByAmount,
                Stage::MeanPriceByType,
                Stage::CountsByType,
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == name)
            .ok_or_else(|| format!("unknown stage `{}`", s.trim()))
    }
}
