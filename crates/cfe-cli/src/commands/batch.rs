//! Batch command - accuracy test over a set of receipts with ground truth.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use cfe_core::batch::DEFAULT_CONCURRENCY;
use cfe_core::store::TestResultRecord;
use cfe_core::{
    BatchItem, BatchRunner, GroundTruth, JsonDirStore, MetricsAggregator, ValidationEngine,
};

const SUPPORTED_EXTENSIONS: [&str; 8] = ["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files glob pattern
    #[arg(required = true)]
    input: String,

    /// Directory holding `<stem>.json` ground truth for each input
    #[arg(short, long)]
    truth_dir: PathBuf,

    /// Result store directory
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Batch name (default: timestamp)
    #[arg(short, long)]
    name: Option<String>,

    /// Write a per-file CSV summary
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Number of documents processed at once
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    jobs: usize,

    /// Exit successfully even when some documents fail
    #[arg(long)]
    continue_on_error: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_supported(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    let items = load_items(&files, &args.truth_dir, args.continue_on_error)?;
    if items.is_empty() {
        anyhow::bail!(
            "None of the {} files has ground truth in {}",
            files.len(),
            args.truth_dir.display()
        );
    }

    println!(
        "{} Found {} receipts with ground truth ({} files matched)",
        style("ℹ").blue(),
        items.len(),
        files.len()
    );

    let store_dir = args.store.clone().unwrap_or_else(super::default_store_dir);
    let store = Arc::new(JsonDirStore::open(&store_dir)?);
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("batch {}", chrono::Local::now().format("%Y-%m-%d %H:%M")));

    let model_dir = super::model_dir(args.model_dir.clone(), &config);
    let analyzer = Arc::new(super::build_analyzer(&config, &model_dir).await);

    let runner = BatchRunner::new(Arc::clone(&analyzer), store)
        .with_validator(ValidationEngine::new(config.validation.clone()))
        .with_aggregator(MetricsAggregator::new(
            config.metrics.clone(),
            config.validation.clone(),
        ))
        .with_concurrency(args.jobs);

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")?
            .progress_chars("=>-"),
    );

    let outcome = runner
        .run_with_progress(&name, items, |record| {
            if let Some(error) = &record.error {
                pb.println(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    record.filename,
                    error.message
                ));
            }
            pb.inc(1);
        })
        .await;
    analyzer.engine().terminate().await;
    let outcome = outcome?;
    pb.finish_and_clear();

    if let Some(path) = &args.summary {
        write_summary(path, &outcome.results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            path.display()
        );
    }

    let batch = &outcome.batch;
    println!();
    println!(
        "{} Batch {} ({}) finished in {:?}: {:?}",
        style("✓").green(),
        batch.name,
        batch.id,
        start.elapsed(),
        batch.status
    );
    println!(
        "   {} succeeded, {} failed",
        style(batch.succeeded).green(),
        style(batch.failed).red()
    );

    if let Some(metrics) = &batch.metrics {
        println!(
            "   average accuracy {:.2}%, confidence {:.2}, {:.0}ms per receipt",
            metrics.avg_accuracy, metrics.avg_confidence, metrics.avg_processing_time
        );
        for recommendation in &metrics.recommendations {
            println!("   - {}", recommendation);
        }
    }
    println!("   results stored in {}", store_dir.display());

    if batch.failed > 0 && !args.continue_on_error {
        anyhow::bail!("{} of {} receipts failed", batch.failed, batch.total);
    }

    Ok(())
}

fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Pair each file with `<truth_dir>/<stem>.json`; files without ground truth are skipped.
fn load_items(
    files: &[PathBuf],
    truth_dir: &Path,
    continue_on_error: bool,
) -> anyhow::Result<Vec<BatchItem>> {
    let mut items = Vec::with_capacity(files.len());

    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let truth_path = truth_dir.join(format!("{}.json", stem));
        if !truth_path.is_file() {
            warn!("No ground truth for {}, skipping", path.display());
            continue;
        }

        let truth = match fs::read_to_string(&truth_path)
            .map_err(anyhow::Error::from)
            .and_then(|text| Ok(GroundTruth::from_json_str(&text)?))
        {
            Ok(truth) => truth,
            Err(e) if continue_on_error => {
                warn!("Skipping {}: {}", truth_path.display(), e);
                continue;
            }
            Err(e) => anyhow::bail!("Invalid ground truth {}: {}", truth_path.display(), e),
        };

        debug!("Queued {} with {} expected fields", path.display(), truth.len());
        items.push(BatchItem::new(
            super::analyze::file_name(path),
            fs::read(path)?,
            truth,
        ));
    }

    Ok(items)
}

fn write_summary(path: &Path, results: &[TestResultRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "accuracy",
        "confidence",
        "source",
        "processing_time_ms",
        "error_kind",
        "error",
    ])?;

    for record in results {
        let row = match (&record.extraction, &record.validation, &record.error) {
            (Some(extraction), Some(validation), None) => [
                record.filename.clone(),
                "success".to_string(),
                format!("{:.2}", validation.overall_accuracy),
                format!("{:.2}", extraction.confidence),
                extraction.source.to_string(),
                extraction.processing_time.to_string(),
                String::new(),
                String::new(),
            ],
            (extraction, _, error) => [
                record.filename.clone(),
                "error".to_string(),
                String::new(),
                String::new(),
                extraction
                    .as_ref()
                    .map(|e| e.source.to_string())
                    .unwrap_or_default(),
                String::new(),
                error.as_ref().map(|e| e.kind.to_string()).unwrap_or_default(),
                error.as_ref().map(|e| e.message.clone()).unwrap_or_default(),
            ],
        };
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_are_case_insensitive() {
        assert!(is_supported(Path::new("recibo.PDF")));
        assert!(is_supported(Path::new("scan.jpeg")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn files_without_ground_truth_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let with_truth = dir.path().join("enero.pdf");
        let without_truth = dir.path().join("febrero.pdf");
        fs::write(&with_truth, b"%PDF-1.4").unwrap();
        fs::write(&without_truth, b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("enero.json"), r#"{"tariffType": "1C"}"#).unwrap();

        let items = load_items(&[with_truth, without_truth], dir.path(), false).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "enero.pdf");
        assert_eq!(items[0].truth.len(), 1);
    }

    #[test]
    fn invalid_ground_truth_fails_unless_continuing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("marzo.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();
        fs::write(dir.path().join("marzo.json"), "[1, 2]").unwrap();

        assert!(load_items(&[file.clone()], dir.path(), false).is_err());
        assert!(load_items(&[file], dir.path(), true).unwrap().is_empty());
    }
}
