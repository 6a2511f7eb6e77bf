//! Corpus-level accuracy aggregation and recommendations.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::engine::round2;
use crate::models::config::{MetricsConfig, ValidationConfig};
use crate::models::metrics::{ErrorPattern, Impact, MetricsReport};
use crate::models::validation::{ErrorKind, ValidationResult};

/// Derives a [`MetricsReport`] from validation results.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    config: MetricsConfig,
    validation: ValidationConfig,
}

impl MetricsAggregator {
    /// `validation` supplies the critical field set used to rate error impact.
    pub fn new(config: MetricsConfig, validation: ValidationConfig) -> Self {
        Self { config, validation }
    }

    /// Aggregate a batch of results. Empty input yields a zeroed report.
    pub fn aggregate(&self, results: &[ValidationResult]) -> MetricsReport {
        if results.is_empty() {
            return MetricsReport::default();
        }

        let n = results.len() as f64;
        let mean_accuracy = results.iter().map(|r| r.overall_accuracy).sum::<f64>() / n;
        let avg_accuracy = round2(mean_accuracy);
        let avg_confidence = round2(results.iter().map(|r| r.confidence).sum::<f64>() / n);
        let avg_processing_time =
            round2(results.iter().map(|r| r.processing_time as f64).sum::<f64>() / n);

        let precision_by_field = precision_by_field(results);
        let common_errors = self.common_errors(results);

        let mut report = MetricsReport {
            total_tests: results.len(),
            avg_accuracy,
            avg_confidence,
            avg_processing_time,
            precision_by_field,
            common_errors,
            recommendations: Vec::new(),
        };
        report.recommendations = self.recommendations(&report, mean_accuracy);

        debug!(
            tests = report.total_tests,
            avg_accuracy = report.avg_accuracy,
            patterns = report.common_errors.len(),
            "Aggregated validation metrics"
        );
        report
    }

    fn common_errors(&self, results: &[ValidationResult]) -> Vec<ErrorPattern> {
        let mut counts: HashMap<(&str, ErrorKind), usize> = HashMap::new();
        for result in results {
            for (field, field_result) in &result.field_results {
                if field_result.error_kind != ErrorKind::None {
                    *counts
                        .entry((field.as_str(), field_result.error_kind))
                        .or_default() += 1;
                }
            }
        }

        let mut patterns: Vec<ErrorPattern> = counts
            .into_iter()
            .map(|((field, error_kind), count)| ErrorPattern {
                field: field.to_string(),
                error_kind,
                count,
                impact: if self.validation.is_critical(field) {
                    Impact::High
                } else {
                    Impact::Medium
                },
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.field.cmp(&b.field))
                .then_with(|| a.error_kind.cmp(&b.error_kind))
        });
        patterns.truncate(self.config.top_errors);
        patterns
    }

    /// Ordered guidance: accuracy band, weak fields, weak critical fields, sample size.
    ///
    /// The band is chosen from the unrounded mean.
    fn recommendations(&self, report: &MetricsReport, mean_accuracy: f64) -> Vec<String> {
        let c = &self.config;
        let mut recommendations = Vec::new();
        let band = mean_accuracy;
        // Truncated so the printed figure never contradicts the band.
        let avg = (mean_accuracy * 100.0).floor() / 100.0;

        if band < c.low_accuracy_threshold {
            recommendations.push(format!(
                "Average accuracy {:.2}% is below {}%: precision is low, review extraction rules and consider retraining the OCR model",
                avg, c.low_accuracy_threshold
            ));
        } else if band < c.acceptable_threshold {
            recommendations.push(format!(
                "Average accuracy {:.2}% is in the {}–{}% acceptable range; tune the weakest field rules to improve it",
                avg, c.low_accuracy_threshold, c.acceptable_threshold
            ));
        } else if band >= c.production_threshold {
            recommendations.push(format!(
                "Average accuracy {:.2}% meets the {}% production-ready threshold",
                avg, c.production_threshold
            ));
        }

        for (field, precision) in &report.precision_by_field {
            if *precision < c.field_precision_threshold {
                recommendations.push(format!(
                    "Field {} has {:.2}% precision, below {}%; review its extraction rule",
                    field, precision, c.field_precision_threshold
                ));
            }
        }

        for (field, precision) in &report.precision_by_field {
            if self.validation.is_critical(field) && *precision < c.critical_precision_threshold {
                recommendations.push(format!(
                    "Critical field {} has {:.2}% precision, below {}%; prioritize improving it",
                    field, precision, c.critical_precision_threshold
                ));
            }
        }

        if report.total_tests < c.min_significant_tests {
            recommendations.push(format!(
                "Only {} tests aggregated; at least {} are needed for statistically significant results",
                report.total_tests, c.min_significant_tests
            ));
        }

        recommendations
    }
}

/// Mean accuracy per field over the results that expected it.
fn precision_by_field(results: &[ValidationResult]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for result in results {
        for (field, field_result) in &result.field_results {
            let entry = sums.entry(field.as_str()).or_default();
            entry.0 += field_result.accuracy;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(field, (sum, count))| (field.to_string(), round2(sum / count as f64)))
        .collect()
}
