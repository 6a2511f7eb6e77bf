//! CLI application for CFE receipt OCR accuracy testing.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{analyze, batch, compare, config, consumption, models, report, validate};

/// CFE receipt OCR - extract and validate fields from CFE electricity receipts
#[derive(Parser)]
#[command(name = "cfe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a single receipt
    Analyze(analyze::AnalyzeArgs),

    /// Extract fields from a receipt and validate them against ground truth
    Validate(validate::ValidateArgs),

    /// Compare an extracted field map with ground truth (no OCR)
    Compare(compare::CompareArgs),

    /// Run an accuracy test over many receipts
    Batch(batch::BatchArgs),

    /// Aggregate accuracy metrics from stored results
    Report(report::ReportArgs),

    /// Analyze a monthly consumption history
    Consumption(consumption::ConsumptionArgs),

    /// Inspect OCR models
    Models(models::ModelsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Analyze(args) => analyze::run(args, config_path).await,
        Commands::Validate(args) => validate::run(args, config_path).await,
        Commands::Compare(args) => compare::run(args, config_path),
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Report(args) => report::run(args, config_path),
        Commands::Consumption(args) => consumption::run(args, config_path),
        Commands::Models(args) => models::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path),
    }
}
