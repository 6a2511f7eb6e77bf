//! Consumption command - trend, seasonality and forecast over monthly kWh.

use std::path::PathBuf;

use clap::Args;

use cfe_core::consumption::{self, MonthlyConsumption};

/// Arguments for the consumption command.
#[derive(Args)]
pub struct ConsumptionArgs {
    /// JSON array of `{"period": "YYYY-MM-DD", "kwh": number}` entries
    #[arg(required = true)]
    history: PathBuf,

    /// Months to forecast (overrides config)
    #[arg(long)]
    forecast_months: Option<usize>,
}

pub fn run(args: ConsumptionArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(months) = args.forecast_months {
        config.consumption.forecast_months = months;
    }

    let history: Vec<MonthlyConsumption> = serde_json::from_value(super::read_json(&args.history)?)
        .map_err(|e| anyhow::anyhow!("Invalid consumption history: {}", e))?;

    let analysis = consumption::analyze(&history, &config.consumption)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);

    Ok(())
}
