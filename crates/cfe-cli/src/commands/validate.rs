//! Validate command - analyze one receipt and score it against ground truth.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use cfe_core::ValidationEngine;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Ground-truth JSON object of expected field values
    #[arg(short, long)]
    truth: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub async fn run(args: ValidateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let expected = super::read_json(&args.truth)?;
    let validator = ValidationEngine::new(config.validation.clone());

    let data = fs::read(&args.input)?;
    let filename = super::analyze::file_name(&args.input);

    let model_dir = super::model_dir(args.model_dir.clone(), &config);
    let analyzer = super::build_analyzer(&config, &model_dir).await;
    let analyzed = analyzer.analyze_document(&data, &filename).await;
    analyzer.engine().terminate().await;
    let extraction = analyzed?;

    let result = validator.validate_json(
        &extraction.extracted_fields,
        &expected,
        extraction.processing_time,
        extraction.confidence,
    )?;

    eprintln!(
        "{} {}: {:.2}% accuracy ({}/{} fields matched)",
        if result.errors.is_empty() {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        filename,
        result.overall_accuracy,
        result.summary.matched_fields,
        result.summary.total_fields
    );

    super::emit(&serde_json::to_string_pretty(&result)?, args.output.as_deref())
}
