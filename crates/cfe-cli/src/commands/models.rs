//! Models command - inspect the OCR model directory.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use cfe_core::EngineStatus;
use cfe_core::ocr::{MODEL_FILES, resolve_model_dir};

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Report which model files are present
    Status(StatusArgs),

    /// Load the models and report the engine state
    Check(StatusArgs),
}

#[derive(Args)]
struct StatusArgs {
    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    match args.command {
        ModelsCommand::Status(status) => {
            let dir = super::model_dir(status.model_dir, &config);
            check_status(&dir, &config.ocr.language)
        }
        ModelsCommand::Check(status) => {
            let dir = super::model_dir(status.model_dir, &config);
            check_engine(&dir, &config).await
        }
    }
}

fn check_status(model_dir: &std::path::Path, language: &str) -> anyhow::Result<()> {
    let dir = resolve_model_dir(model_dir, language);

    println!("{}", style("Model Status").bold());
    println!("Language: {}", style(language).cyan().bold());
    println!("{} {}", style("▸").bold(), dir.display());

    let mut all_present = true;
    let mut total_size: u64 = 0;

    for name in MODEL_FILES {
        let path = dir.join(name);
        let (status, size_str) = if path.is_file() {
            let size = fs::metadata(&path)?.len();
            total_size += size;
            if size > 0 {
                (style("✓").green(), format_size(size))
            } else {
                all_present = false;
                (style("⚠").yellow(), "empty".to_string())
            }
        } else {
            all_present = false;
            (style("✗").red(), "missing".to_string())
        };

        println!("    {} {:<25} {:>10}", status, name, size_str);
    }

    if all_present {
        println!(
            "    {} Ready ({} total)",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "    {} Place {} in {} or pass --model-dir",
            style("⚠").yellow(),
            MODEL_FILES.join(", "),
            dir.display()
        );
    }

    Ok(())
}

async fn check_engine(
    model_dir: &std::path::Path,
    config: &cfe_core::CfeConfig,
) -> anyhow::Result<()> {
    let analyzer = super::build_analyzer(config, model_dir).await;
    let status = analyzer.engine().status().await;
    analyzer.engine().terminate().await;

    match status {
        EngineStatus::Ready => {
            println!("{} OCR engine ready", style("✓").green());
            Ok(())
        }
        other => anyhow::bail!("OCR engine is {:?}; run with -v for details", other),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}
