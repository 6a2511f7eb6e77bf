//! Field-by-field comparison of an extraction against ground truth.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::error::Result;
use crate::models::config::ValidationConfig;
use crate::models::receipt::{ExtractedFields, FieldValue};
use crate::models::validation::{
    ErrorKind, FieldResult, GroundTruth, ValidationResult, ValidationSummary,
};

/// Compares extracted fields against expected values.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: ValidationConfig,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate against a JSON ground-truth object.
    ///
    /// Fails with `ValidationInputInvalid` before any comparison when the ground
    /// truth is not an object of scalar values.
    pub fn validate_json(
        &self,
        extracted: &ExtractedFields,
        expected: &serde_json::Value,
        processing_time: u64,
        confidence: f64,
    ) -> Result<ValidationResult> {
        let truth = GroundTruth::from_json(expected)?;
        Ok(self.validate(extracted, &truth, processing_time, confidence))
    }

    /// Compare every expected field and aggregate a weighted accuracy.
    pub fn validate(
        &self,
        extracted: &ExtractedFields,
        expected: &GroundTruth,
        processing_time: u64,
        confidence: f64,
    ) -> ValidationResult {
        let mut result = ValidationResult {
            overall_accuracy: 0.0,
            field_results: Default::default(),
            summary: ValidationSummary::default(),
            confidence,
            processing_time,
            errors: Vec::new(),
        };

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for (field, expected_value) in expected.iter() {
            let field_result = self.compare_field(expected_value.as_ref(), extracted.get(field));

            let weight = if self.config.is_critical(field) {
                self.config.critical_weight
            } else {
                1.0
            };
            weighted_sum += field_result.accuracy * weight;
            total_weight += weight;

            result.summary.total_fields += 1;
            match field_result.error_kind {
                ErrorKind::None => result.summary.matched_fields += 1,
                ErrorKind::Missing => result.summary.missed_fields += 1,
                ErrorKind::Incorrect => result.summary.incorrect_fields += 1,
            }

            if !field_result.matched {
                result.errors.push(format!(
                    "{}: {} vs {}",
                    field_result.error_kind,
                    display_value(field_result.expected.as_ref()),
                    display_value(field_result.extracted.as_ref())
                ));
            }

            result.field_results.insert(field.clone(), field_result);
        }

        if total_weight > 0.0 {
            result.overall_accuracy = round2(weighted_sum / total_weight);
            // Only a full match may report 100.
            if result.summary.matched_fields < result.summary.total_fields {
                result.overall_accuracy = result.overall_accuracy.min(99.99);
            }
        }

        debug!(
            fields = result.summary.total_fields,
            matched = result.summary.matched_fields,
            accuracy = result.overall_accuracy,
            "Validated extraction"
        );
        result
    }

    /// Compare one field. The first applicable rule decides.
    pub fn compare_field(
        &self,
        expected: Option<&FieldValue>,
        extracted: Option<&FieldValue>,
    ) -> FieldResult {
        let outcome = |matched: bool, accuracy: f64, error_kind: ErrorKind| FieldResult {
            expected: expected.cloned(),
            extracted: extracted.cloned(),
            matched,
            accuracy,
            error_kind,
        };

        let Some(actual) = extracted.filter(|v| !v.is_blank()) else {
            return outcome(false, 0.0, ErrorKind::Missing);
        };
        let Some(wanted) = expected else {
            return outcome(false, 0.0, ErrorKind::Incorrect);
        };

        if wanted == actual {
            return outcome(true, 100.0, ErrorKind::None);
        }

        match (wanted, actual) {
            (FieldValue::Text(e), FieldValue::Text(x)) => {
                let (e, x) = (normalize_text(e), normalize_text(x));
                if e == x {
                    outcome(true, 100.0, ErrorKind::None)
                } else {
                    outcome(false, text_similarity(&e, &x), ErrorKind::Incorrect)
                }
            }
            (FieldValue::Number(e), FieldValue::Number(x)) => {
                if self.within_tolerance(*e, *x) {
                    outcome(true, 100.0, ErrorKind::None)
                } else {
                    outcome(false, numeric_accuracy(*e, *x), ErrorKind::Incorrect)
                }
            }
            // Dates and mismatched types only match on equality, checked above.
            _ => outcome(false, 0.0, ErrorKind::Incorrect),
        }
    }

    fn within_tolerance(&self, expected: Decimal, extracted: Decimal) -> bool {
        if expected.is_zero() {
            return extracted.is_zero();
        }
        let Some(tolerance) = Decimal::from_f64_retain(self.config.numeric_tolerance) else {
            return false;
        };
        let deviation = expected.checked_sub(extracted).map(|d| d.abs());
        let allowed = tolerance.checked_mul(expected.abs());
        matches!((deviation, allowed), (Some(d), Some(a)) if d <= a)
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `100 - 100 * distance / max_len`, floored at 0.
fn text_similarity(expected: &str, extracted: &str) -> f64 {
    let max_len = expected.chars().count().max(extracted.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let distance = edit_distance(expected, extracted);
    (100.0 - 100.0 * distance as f64 / max_len as f64).max(0.0)
}

/// `100 - 100 * |extracted - expected| / |expected|`, floored at 0.
fn numeric_accuracy(expected: Decimal, extracted: Decimal) -> f64 {
    if expected.is_zero() {
        return 0.0;
    }
    let deviation = extracted
        .checked_sub(expected)
        .and_then(|d| d.abs().checked_div(expected.abs()))
        .and_then(|d| d.to_f64())
        .unwrap_or(f64::INFINITY);
    (100.0 - 100.0 * deviation).max(0.0)
}

/// Levenshtein distance over characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

fn display_value(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
