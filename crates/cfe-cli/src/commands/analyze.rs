//! Analyze command - extract fields from a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use cfe_core::ExtractionResult;

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Show extraction confidence, source and warnings
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per field
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: AnalyzeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let data = fs::read(&args.input)?;
    let filename = file_name(&args.input);

    info!("Analyzing {}", args.input.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Analyzing {}", filename));

    let model_dir = super::model_dir(args.model_dir.clone(), &config);
    let analyzer = super::build_analyzer(&config, &model_dir).await;
    let analyzed = analyzer.analyze_document(&data, &filename).await;
    analyzer.engine().terminate().await;
    spinner.finish_and_clear();

    let result = analyzed?;

    if args.show_confidence {
        eprintln!(
            "{} confidence {:.1}% via {} in {}ms",
            style("ℹ").blue(),
            result.confidence * 100.0,
            result.source,
            result.processing_time
        );
        for warning in &result.warnings {
            eprintln!("  {} {}", style("!").yellow(), warning);
        }
    }

    if result.usable {
        eprintln!("{} Extraction passes the minimum-viability gate", style("✓").green());
    } else {
        eprintln!(
            "{} Extraction is missing identity, consumption or billing fields",
            style("✗").red()
        );
    }

    let output = format_result(&result, args.format)?;
    super::emit(&output, args.output.as_deref())
}

pub fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["field", "value"])?;
    for (field, value) in result.extracted_fields.iter() {
        wtr.write_record([field.clone(), value.to_string()])?;
    }
    let data = wtr.into_inner()?;
    Ok(String::from_utf8(data)?)
}

fn format_text(result: &ExtractionResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("Receipt: {}\n", result.filename));
    out.push_str(&format!(
        "Source: {} (confidence {:.1}%)\n",
        result.source,
        result.confidence * 100.0
    ));
    out.push_str(&format!("Usable: {}\n", if result.usable { "yes" } else { "no" }));
    out.push('\n');

    if result.extracted_fields.is_empty() {
        out.push_str("No fields extracted.\n");
    }
    for (field, value) in result.extracted_fields.iter() {
        out.push_str(&format!("{:<20} {}\n", field, value));
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("  - {}\n", warning));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfe_core::{ExtractedFields, ExtractionSource, FieldValue, ReceiptField};

    fn result() -> ExtractionResult {
        let mut fields = ExtractedFields::new();
        fields.insert(ReceiptField::ServiceNumber, FieldValue::text("123456789012"));
        fields.insert(ReceiptField::TariffType, FieldValue::text("1C"));
        ExtractionResult {
            filename: "recibo.pdf".to_string(),
            raw_text: String::new(),
            confidence: 0.82,
            extracted_fields: fields,
            source: ExtractionSource::PrimaryTextLayer,
            processing_time: 12,
            warnings: vec!["sparse text layer".to_string()],
            usable: false,
        }
    }

    #[test]
    fn csv_has_one_row_per_field() {
        let csv = format_csv(&result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "field,value");
        assert!(lines.contains(&"serviceNumber,123456789012"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn text_lists_fields_and_warnings() {
        let text = format_text(&result());
        assert!(text.contains("Source: primary-text-layer (confidence 82.0%)"));
        assert!(text.contains("Usable: no"));
        assert!(text.contains("tariffType"));
        assert!(text.contains("  - sparse text layer"));
    }
}
