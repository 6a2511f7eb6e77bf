//! Corpus-level accuracy report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::validation::ErrorKind;

/// How much an error pattern hurts overall accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
}

/// A recurring `(field, errorKind)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPattern {
    pub field: String,
    pub error_kind: ErrorKind,
    pub count: usize,
    pub impact: Impact,
}

/// Aggregate accuracy over a set of validation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub total_tests: usize,
    pub avg_accuracy: f64,
    pub avg_confidence: f64,
    pub avg_processing_time: f64,
    /// Mean field accuracy over the tests that expected the field.
    pub precision_by_field: BTreeMap<String, f64>,
    pub common_errors: Vec<ErrorPattern>,
    pub recommendations: Vec<String>,
}
