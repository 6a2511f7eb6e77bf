//! Consumption history statistics: trend, seasonality and a linear forecast.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CfeError, Result};
use crate::models::config::ConsumptionConfig;

/// Energy billed for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyConsumption {
    /// Start of the billing month.
    pub period: NaiveDate,
    pub kwh: f64,
}

impl MonthlyConsumption {
    pub fn new(period: NaiveDate, kwh: f64) -> Self {
        Self { period, kwh }
    }
}

/// Direction of consumption over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Statistics over a consumption history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionAnalysis {
    pub months: usize,
    pub mean_kwh: f64,
    /// Population standard deviation.
    pub std_dev_kwh: f64,
    pub coefficient_of_variation: f64,
    pub min: MonthlyConsumption,
    pub max: MonthlyConsumption,
    /// Regression slope in kWh per month.
    pub slope_kwh_per_month: f64,
    pub trend: Trend,
    pub seasonal: bool,
    pub forecast: Vec<MonthlyConsumption>,
}

/// Analyze a consumption history. Order of the input does not matter.
pub fn analyze(history: &[MonthlyConsumption], config: &ConsumptionConfig) -> Result<ConsumptionAnalysis> {
    if history.len() < 2 {
        return Err(CfeError::InsufficientData(format!(
            "consumption analysis needs at least 2 months, got {}",
            history.len()
        )));
    }
    if let Some(bad) = history.iter().find(|m| !m.kwh.is_finite()) {
        return Err(CfeError::InsufficientData(format!(
            "non-finite consumption for {}",
            bad.period
        )));
    }

    let mut series = history.to_vec();
    series.sort_by_key(|m| m.period);

    let n = series.len() as f64;
    let mean = series.iter().map(|m| m.kwh).sum::<f64>() / n;
    let variance = series.iter().map(|m| (m.kwh - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    let coefficient_of_variation = if mean.abs() > f64::EPSILON {
        std_dev / mean.abs()
    } else {
        0.0
    };

    let (slope, intercept) = linear_fit(&series, mean);

    let trend = if mean.abs() <= f64::EPSILON || (slope / mean).abs() <= config.trend_threshold {
        Trend::Stable
    } else if slope > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    };

    let last = series[series.len() - 1].period;
    let forecast = (1..=config.forecast_months)
        .filter_map(|ahead| {
            let period = last.checked_add_months(Months::new(ahead as u32))?;
            let x = (series.len() - 1 + ahead) as f64;
            Some(MonthlyConsumption::new(period, (intercept + slope * x).max(0.0)))
        })
        .collect();

    let min = series
        .iter()
        .copied()
        .min_by(|a, b| a.kwh.total_cmp(&b.kwh))
        .unwrap_or(series[0]);
    let max = series
        .iter()
        .copied()
        .max_by(|a, b| a.kwh.total_cmp(&b.kwh))
        .unwrap_or(series[0]);

    debug!(
        months = series.len(),
        mean,
        slope,
        trend = ?trend,
        "Analyzed consumption history"
    );

    Ok(ConsumptionAnalysis {
        months: series.len(),
        mean_kwh: mean,
        std_dev_kwh: std_dev,
        coefficient_of_variation,
        min,
        max,
        slope_kwh_per_month: slope,
        trend,
        seasonal: coefficient_of_variation > config.seasonality_threshold,
        forecast,
    })
}

/// Least-squares fit of kWh against month index; returns `(slope, intercept)`.
fn linear_fit(series: &[MonthlyConsumption], mean_y: f64) -> (f64, f64) {
    let n = series.len() as f64;
    let mean_x = (n - 1.0) / 2.0;

    let (covariance, variance_x) = series.iter().enumerate().fold((0.0, 0.0), |(cov, var), (i, m)| {
        let dx = i as f64 - mean_x;
        (cov + dx * (m.kwh - mean_y), var + dx * dx)
    });

    let slope = if variance_x > 0.0 {
        covariance / variance_x
    } else {
        0.0
    };
    (slope, mean_y - slope * mean_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use pretty_assertions::assert_eq;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    fn history(values: &[f64]) -> Vec<MonthlyConsumption> {
        values
            .iter()
            .enumerate()
            .map(|(i, kwh)| MonthlyConsumption::new(month(i as u32 + 1), *kwh))
            .collect()
    }

    #[test]
    fn test_requires_two_points() {
        let err = analyze(&history(&[245.0]), &ConsumptionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InsufficientData);

        let err = analyze(&[], &ConsumptionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InsufficientData);
    }

    #[test]
    fn test_increasing_series_with_forecast() {
        let analysis = analyze(&history(&[100.0, 120.0, 140.0, 160.0]), &ConsumptionConfig::default()).unwrap();

        assert_eq!(analysis.months, 4);
        assert_eq!(analysis.mean_kwh, 130.0);
        assert!((analysis.slope_kwh_per_month - 20.0).abs() < 1e-9);
        assert_eq!(analysis.trend, Trend::Increasing);
        assert_eq!(analysis.min.kwh, 100.0);
        assert_eq!(analysis.max.period, month(4));

        let forecast: Vec<f64> = analysis.forecast.iter().map(|m| m.kwh.round()).collect();
        assert_eq!(forecast, vec![180.0, 200.0, 220.0]);
        assert_eq!(analysis.forecast[0].period, month(5));
    }

    #[test]
    fn test_flat_series_is_stable_and_not_seasonal() {
        let analysis = analyze(&history(&[245.0, 250.0, 240.0, 245.0]), &ConsumptionConfig::default()).unwrap();
        assert_eq!(analysis.trend, Trend::Stable);
        assert!(!analysis.seasonal);
    }

    #[test]
    fn test_swinging_series_is_seasonal() {
        let analysis = analyze(&history(&[100.0, 400.0, 100.0, 400.0]), &ConsumptionConfig::default()).unwrap();
        assert!(analysis.seasonal);
        assert!((analysis.coefficient_of_variation - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_clamped_at_zero() {
        let analysis = analyze(&history(&[300.0, 200.0, 100.0]), &ConsumptionConfig::default()).unwrap();
        assert_eq!(analysis.trend, Trend::Decreasing);
        assert!(analysis.forecast.iter().all(|m| m.kwh >= 0.0));
        assert_eq!(analysis.forecast[0].kwh, 0.0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut shuffled = history(&[100.0, 120.0, 140.0]);
        shuffled.reverse();
        let analysis = analyze(&shuffled, &ConsumptionConfig::default()).unwrap();
        assert_eq!(analysis.trend, Trend::Increasing);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = ConsumptionConfig {
            trend_threshold: 0.5,
            ..ConsumptionConfig::default()
        };
        let analysis = analyze(&history(&[100.0, 120.0, 140.0, 160.0]), &strict).unwrap();
        assert_eq!(analysis.trend, Trend::Stable);
    }
}
