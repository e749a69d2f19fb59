use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use permitstats::{
    aggregate::TopN,
    fetch::DEFAULT_PERMITS_URL,
    pipeline::{Pipeline, PipelineConfig, Stage},
    PipelineError,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(
    name = "permitstats",
    version,
    about = "Fetch, clean and summarize the Chicago building permits dataset"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring every summary up to date, running only what is missing or stale.
    Run {
        #[command(flatten)]
        args: RunArgs,
        /// Print the run report as JSON when done.
        #[arg(long)]
        json: bool,
    },
    /// Show which stages are up to date without running anything.
    Status {
        #[command(flatten)]
        args: RunArgs,
        /// Print a JSON document instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Number of most expensive permits to keep.
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    top_n: i64,
    /// Snapshot date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_PERMITS_URL)]
    url: Url,
    /// Stage to bring up to date, along with everything it needs.
    #[arg(long, default_value_t = Stage::Orchestrate)]
    target: Stage,
}

impl RunArgs {
    fn into_config(self) -> Result<PipelineConfig> {
        let top_n = TopN::new(self.top_n).context("invalid --top-n")?;
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        Ok(PipelineConfig::new(self.data_dir, date)
            .with_url(self.url)
            .with_top_n(top_n))
    }
}

#[tokio::main]
async fn main() {
    // ─── 1) init logging ──────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command).await {
        match e.downcast_ref::<PipelineError>().and_then(PipelineError::stage) {
            Some(stage) => error!(stage = %stage, "{:#}", e),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run { args, json } => run(args, json).await,
        Command::Status { args, json } => status(args, json),
    }
}

async fn run(args: RunArgs, json: bool) -> Result<()> {
    let target = args.target;
    let config = args.into_config()?;
    info!(
        data_dir = %config.data_dir.display(),
        date = %config.date,
        target = %target,
        "startup"
    );
    let pipeline = Pipeline::new(config).context("building pipeline")?;

    let report = pipeline
        .run(target)
        .await
        .context("pipeline run failed")?;

    info!(
        executed = report.executed.len(),
        skipped = report.skipped.len(),
        "all done"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn status(args: RunArgs, json: bool) -> Result<()> {
    let target = args.target;
    let pipeline = Pipeline::new(args.into_config()?).context("building pipeline")?;
    let stages = pipeline.status(target)?;
    let snapshots = pipeline.layout().raw_snapshots()?;

    if json {
        let doc = serde_json::json!({
            "date": pipeline.config().date,
            "top_n": pipeline.config().top_n,
            "data_dir": pipeline.layout().root(),
            "stages": stages,
            "snapshots": snapshots
                .iter()
                .map(|(date, path)| serde_json::json!({ "date": date, "path": path }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!(
        "date {}  data dir {}",
        pipeline.config().date,
        pipeline.layout().root().display()
    );
    for s in &stages {
        let output = s
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:<8} {}", s.stage, s.freshness.as_str(), output);
    }
    println!("{} raw snapshot(s) on disk", snapshots.len());
    for (date, path) in &snapshots {
        println!("  {}  {}", date, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults_to_the_full_pipeline() {
        let cli = Cli::try_parse_from(["permitstats", "run"]).unwrap();
        let Command::Run { args, json } = cli.command else {
            panic!("expected run");
        };
        assert!(!json);
        assert_eq!(args.target, Stage::Orchestrate);
        assert_eq!(args.top_n, 10);
    }

    #[test]
    fn target_parses_stage_names() {
        let cli = Cli::try_parse_from([
            "permitstats",
            "status",
            "--target",
            "counts_by_type",
            "--json",
        ])
        .unwrap();
        let Command::Status { args, json } = cli.command else {
            panic!("expected status");
        };
        assert!(json);
        assert_eq!(args.target, Stage::CountsByType);
    }

    #[test]
    fn unknown_target_is_rejected() {
        assert!(Cli::try_parse_from(["permitstats", "run", "--target", "download"]).is_err());
    }

    #[test]
    fn non_positive_top_n_is_rejected() {
        let cli = Cli::try_parse_from(["permitstats", "run", "--top-n", "0"]).unwrap();
        let Command::Run { args, .. } = cli.command else {
            panic!("expected run");
        };
        assert!(args.into_config().is_err());
    }
}
