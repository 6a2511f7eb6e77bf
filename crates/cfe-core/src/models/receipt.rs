//! Receipt extraction models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field recognized on a CFE receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptField {
    ServiceNumber,
    AccountNumber,
    ClientName,
    Address,
    CurrentConsumption,
    PreviousConsumption,
    #[serde(rename = "consumptionKWh")]
    ConsumptionKwh,
    CurrentAmount,
    TariffType,
    IssueDate,
    DueDate,
    MeterNumber,
}

impl ReceiptField {
    /// All recognized fields.
    pub const ALL: [ReceiptField; 12] = [
        ReceiptField::ServiceNumber,
        ReceiptField::AccountNumber,
        ReceiptField::ClientName,
        ReceiptField::Address,
        ReceiptField::CurrentConsumption,
        ReceiptField::PreviousConsumption,
        ReceiptField::ConsumptionKwh,
        ReceiptField::CurrentAmount,
        ReceiptField::TariffType,
        ReceiptField::IssueDate,
        ReceiptField::DueDate,
        ReceiptField::MeterNumber,
    ];

    /// Fields weighted higher in aggregate accuracy by default.
    pub const CRITICAL: [ReceiptField; 3] = [
        ReceiptField::ServiceNumber,
        ReceiptField::ConsumptionKwh,
        ReceiptField::CurrentAmount,
    ];

    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptField::ServiceNumber => "serviceNumber",
            ReceiptField::AccountNumber => "accountNumber",
            ReceiptField::ClientName => "clientName",
            ReceiptField::Address => "address",
            ReceiptField::CurrentConsumption => "currentConsumption",
            ReceiptField::PreviousConsumption => "previousConsumption",
            ReceiptField::ConsumptionKwh => "consumptionKWh",
            ReceiptField::CurrentAmount => "currentAmount",
            ReceiptField::TariffType => "tariffType",
            ReceiptField::IssueDate => "issueDate",
            ReceiptField::DueDate => "dueDate",
            ReceiptField::MeterNumber => "meterNumber",
        }
    }
}

impl fmt::Display for ReceiptField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReceiptField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown receipt field: {}", s))
    }
}

/// A typed field value.
///
/// Numbers are kept as decimals so tolerance checks are exact. JSON numbers map to
/// `Number`, JSON strings to `Text`; `Date` only arises from typed callers and
/// serializes as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Date(DateTime<Utc>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    /// Build a number from a float; non-finite values are rejected.
    pub fn number(n: f64) -> Option<Self> {
        Decimal::from_f64(n).map(FieldValue::Number)
    }

    /// Absent-equivalent values: empty strings count as missing.
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON value; objects, arrays and booleans are not field values.
    pub fn from_json(value: &serde_json::Value) -> Result<Option<Self>, String> {
        match value {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => Ok(Some(FieldValue::Text(s.clone()))),
            serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
                .map(|d| Some(FieldValue::Number(d)))
                .ok_or_else(|| format!("number out of range: {}", n)),
            other => Err(format!("unsupported value type: {}", json_type_name(other))),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(n) => write!(f, "{}", n.normalize()),
            FieldValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => match n.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&n.to_string()),
            },
            FieldValue::Date(d) => serializer.serialize_str(&d.to_rfc3339()),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        FieldValue::from_json(&value)
            .map_err(serde::de::Error::custom)?
            .ok_or_else(|| serde::de::Error::custom("null is not a field value"))
    }
}

/// Extracted field values keyed by field name. Absent fields have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields(BTreeMap<String, FieldValue>);

impl ExtractedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: ReceiptField, value: FieldValue) {
        self.0.insert(field.as_str().to_string(), value);
    }

    /// Insert by raw name, for fields outside the recognized set.
    pub fn insert_named(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Whether the field is present and not blank.
    pub fn has(&self, field: ReceiptField) -> bool {
        self.get(field.as_str()).is_some_and(|v| !v.is_blank())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(ReceiptField, FieldValue)> for ExtractedFields {
    fn from_iter<I: IntoIterator<Item = (ReceiptField, FieldValue)>>(iter: I) -> Self {
        let mut fields = ExtractedFields::new();
        for (field, value) in iter {
            fields.insert(field, value);
        }
        fields
    }
}

/// Which extraction path produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionSource {
    /// Embedded PDF text layer.
    PrimaryTextLayer,
    /// OCR over an image.
    OcrEngine,
    /// OCR re-scan replacing a low-confidence PDF text layer.
    Hybrid,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionSource::PrimaryTextLayer => "primary-text-layer",
            ExtractionSource::OcrEngine => "ocr-engine",
            ExtractionSource::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// Result of analyzing a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Name of the submitted document.
    pub filename: String,
    /// Full text recovered from the document.
    pub raw_text: String,
    /// Estimated trustworthiness of the text (0.0 - 1.0).
    pub confidence: f64,
    /// Fields pulled out of the text.
    pub extracted_fields: ExtractedFields,
    /// Extraction path that produced the text.
    pub source: ExtractionSource,
    /// Wall-clock duration of the analysis in milliseconds.
    pub processing_time: u64,
    /// Human-readable caveats, in the order they arose.
    pub warnings: Vec<String>,
    /// Whether the fields pass the minimum-viability gate.
    pub usable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_names_round_trip() {
        for field in ReceiptField::ALL {
            assert_eq!(field.as_str().parse::<ReceiptField>().unwrap(), field);
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
        }
    }

    #[test]
    fn json_numbers_keep_decimal_precision() {
        let value: FieldValue = serde_json::from_str("1250.50").unwrap();
        assert_eq!(value, FieldValue::Number(Decimal::from_str("1250.50").unwrap()));
        assert_eq!(value.to_string(), "1250.5");
    }

    #[test]
    fn digit_strings_stay_text() {
        let fields: ExtractedFields =
            serde_json::from_str(r#"{"serviceNumber": "123456789012", "consumptionKWh": 245}"#)
                .unwrap();
        assert_eq!(
            fields.get("serviceNumber"),
            Some(&FieldValue::text("123456789012"))
        );
        assert_eq!(fields.get("consumptionKWh"), FieldValue::number(245.0).as_ref());
    }

    #[test]
    fn rejects_structured_values() {
        let err = FieldValue::from_json(&serde_json::json!({"a": 1})).unwrap_err();
        assert!(err.contains("object"));
        assert_eq!(FieldValue::from_json(&serde_json::Value::Null).unwrap(), None);
    }

    #[test]
    fn blank_text_does_not_count_as_present() {
        let mut fields = ExtractedFields::new();
        fields.insert(ReceiptField::TariffType, FieldValue::text(""));
        assert!(!fields.has(ReceiptField::TariffType));
    }
}
