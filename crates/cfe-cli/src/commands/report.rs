//! Report command - aggregate accuracy metrics from stored results.

use std::path::PathBuf;

use clap::Args;
use console::style;

use cfe_core::store::ResultFilter;
use cfe_core::{JsonDirStore, MetricsAggregator, ResultStore};

/// Arguments for the report command.
#[derive(Args)]
pub struct ReportArgs {
    /// Result store directory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Only results of this batch
    #[arg(short, long)]
    batch: Option<String>,

    /// Only results with at least this overall accuracy
    #[arg(long)]
    min_accuracy: Option<f64>,

    /// Only results from the last N days
    #[arg(short, long)]
    days: Option<i64>,

    /// List stored batches instead of aggregating
    #[arg(long)]
    list_batches: bool,
}

pub fn run(args: ReportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let store_dir = args.store.clone().unwrap_or_else(super::default_store_dir);
    if !store_dir.is_dir() {
        anyhow::bail!("No result store at {}", store_dir.display());
    }
    let store = JsonDirStore::open(&store_dir)?;

    if args.list_batches {
        let batches = store.list_batches()?;
        if batches.is_empty() {
            eprintln!("{} No batches stored.", style("ℹ").blue());
        }
        println!("{}", serde_json::to_string_pretty(&batches)?);
        return Ok(());
    }

    if let Some(id) = &args.batch {
        // Fails early with a clear error for unknown ids.
        store.get_batch(id)?;
    }

    let filter = ResultFilter {
        batch_id: args.batch.clone(),
        min_accuracy: args.min_accuracy,
        since: None,
    };
    let window = args.days.map(recent_window).transpose()?;

    let aggregator = MetricsAggregator::new(config.metrics, config.validation);
    let report = store.aggregate_metrics(&filter, window, &aggregator)?;

    if report.total_tests == 0 {
        eprintln!("{} No validated results match.", style("ℹ").blue());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn recent_window(days: i64) -> anyhow::Result<chrono::Duration> {
    if days <= 0 {
        anyhow::bail!("--days must be positive");
    }
    chrono::Duration::try_days(days)
        .ok_or_else(|| anyhow::anyhow!("--days {} is out of range", days))
}
