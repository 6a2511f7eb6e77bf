//! Validation result models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::receipt::{ExtractedFields, FieldValue};
use crate::error::CfeError;

/// Why a field did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Missing,
    Incorrect,
    None,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Missing => "missing",
            ErrorKind::Incorrect => "incorrect",
            ErrorKind::None => "none",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison outcome for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldResult {
    pub expected: Option<FieldValue>,
    pub extracted: Option<FieldValue>,
    #[serde(rename = "match")]
    pub matched: bool,
    /// Accuracy in [0, 100].
    pub accuracy: f64,
    pub error_kind: ErrorKind,
}

/// Field counts of a validation; `matched + missed + incorrect == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_fields: usize,
    pub matched_fields: usize,
    pub missed_fields: usize,
    pub incorrect_fields: usize,
}

/// Comparison of one extraction against its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Weighted mean of field accuracies in [0, 100], 0 when no fields were expected.
    pub overall_accuracy: f64,
    pub field_results: BTreeMap<String, FieldResult>,
    pub summary: ValidationSummary,
    /// Confidence carried over from the extraction.
    pub confidence: f64,
    /// Extraction duration carried over from the extraction, in milliseconds.
    pub processing_time: u64,
    /// One description per non-matching field.
    pub errors: Vec<String>,
}

/// Expected field values for a document.
///
/// A `None` entry is an explicit JSON `null`: the field is still expected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth(BTreeMap<String, Option<FieldValue>>);

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<FieldValue>) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<FieldValue>)> {
        self.0.iter()
    }

    /// Parse ground truth from a JSON value, which must be an object of scalars.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CfeError> {
        let object = value.as_object().ok_or_else(|| {
            CfeError::ValidationInputInvalid("ground truth must be a JSON object".to_string())
        })?;

        let mut truth = GroundTruth::new();
        for (name, raw) in object {
            let parsed = FieldValue::from_json(raw).map_err(|reason| {
                CfeError::ValidationInputInvalid(format!("field {}: {}", name, reason))
            })?;
            truth.insert(name.clone(), parsed);
        }
        Ok(truth)
    }

    /// Parse ground truth from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, CfeError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            CfeError::ValidationInputInvalid(format!("ground truth is not JSON: {}", e))
        })?;
        Self::from_json(&value)
    }
}

impl From<ExtractedFields> for GroundTruth {
    fn from(fields: ExtractedFields) -> Self {
        let mut truth = GroundTruth::new();
        for (name, value) in fields.iter() {
            truth.insert(name.clone(), Some(value.clone()));
        }
        truth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn parses_object_with_nulls() {
        let truth = GroundTruth::from_json_str(
            r#"{"serviceNumber": "123456789012", "consumptionKWh": 245, "meterNumber": null}"#,
        )
        .unwrap();
        assert_eq!(truth.len(), 3);
        assert!(truth.iter().any(|(k, v)| k == "meterNumber" && v.is_none()));
    }

    #[test]
    fn rejects_non_object_ground_truth() {
        let err = GroundTruth::from_json_str("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), FailureKind::ValidationInputInvalid);

        let err = GroundTruth::from_json_str("not json").unwrap_err();
        assert_eq!(err.kind(), FailureKind::ValidationInputInvalid);
    }

    #[test]
    fn rejects_nested_values() {
        let err = GroundTruth::from_json_str(r#"{"address": {"street": "x"}}"#).unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn field_result_serializes_match_key() {
        let result = FieldResult {
            expected: Some(FieldValue::text("1B")),
            extracted: None,
            matched: false,
            accuracy: 0.0,
            error_kind: ErrorKind::Missing,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["match"], serde_json::json!(false));
        assert_eq!(json["errorKind"], serde_json::json!("missing"));
    }
}
