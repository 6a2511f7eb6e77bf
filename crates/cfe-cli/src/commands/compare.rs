//! Compare command - validate an extracted field map against ground truth, no OCR.

use std::path::PathBuf;

use clap::Args;

use cfe_core::{ExtractedFields, GroundTruth, ValidationEngine};

/// Arguments for the compare command.
#[derive(Args)]
pub struct CompareArgs {
    /// JSON object of extracted field values
    #[arg(short, long)]
    extracted: PathBuf,

    /// JSON object of expected field values
    #[arg(short, long)]
    truth: PathBuf,

    /// Extraction confidence carried into the result (0.0 - 1.0)
    #[arg(long, default_value = "1.0")]
    confidence: f64,

    /// Extraction duration carried into the result, in milliseconds
    #[arg(long, default_value = "0")]
    processing_time_ms: u64,
}

pub fn run(args: CompareArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let extracted = extracted_fields(&super::read_json(&args.extracted)?)?;
    let expected = super::read_json(&args.truth)?;

    let result = ValidationEngine::new(config.validation).validate_json(
        &extracted,
        &expected,
        args.processing_time_ms,
        args.confidence,
    )?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Extracted fields from a JSON object; `null` entries count as not extracted.
fn extracted_fields(value: &serde_json::Value) -> anyhow::Result<ExtractedFields> {
    let parsed = GroundTruth::from_json(value)?;
    let mut fields = ExtractedFields::new();
    for (name, value) in parsed.iter() {
        if let Some(value) = value {
            fields.insert_named(name.clone(), value.clone());
        }
    }
    Ok(fields)
}
