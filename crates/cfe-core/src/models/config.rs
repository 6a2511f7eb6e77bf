//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::receipt::ReceiptField;

/// Main configuration for the cfe pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CfeConfig {
    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// PDF text-layer configuration.
    pub pdf: PdfConfig,

    /// Ground-truth comparison configuration.
    pub validation: ValidationConfig,

    /// Corpus metrics configuration.
    pub metrics: MetricsConfig,

    /// Consumption analysis configuration.
    pub consumption: ConsumptionConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Language model to load at initialization.
    pub language: String,

    /// Directory containing per-language model directories.
    pub model_dir: PathBuf,

    /// Per-document recognition deadline in milliseconds, lock wait included.
    pub timeout_ms: u64,

    /// Keep `[UNK]` tokens in recognized text.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "spa".to_string(),
            model_dir: default_model_dir(),
            timeout_ms: 60_000,
            keep_unk: false,
        }
    }
}

fn default_model_dir() -> PathBuf {
    std::env::var_os("CFE_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models"))
}

/// PDF text-layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Text-layer confidence below which OCR is tried.
    pub ocr_fallback_threshold: f64,

    /// Maximum bytes handed to OCR when no page image can be extracted.
    pub max_ocr_bytes: usize,

    /// Minimum text length to consider a page text-based.
    pub min_page_text_length: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            ocr_fallback_threshold: 0.6,
            max_ocr_bytes: 1024 * 1024,
            min_page_text_length: 50,
        }
    }
}

/// Ground-truth comparison configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fields weighted by `critical_weight` in overall accuracy.
    pub critical_fields: Vec<ReceiptField>,

    /// Weight applied to critical fields (others weigh 1).
    pub critical_weight: f64,

    /// Relative tolerance for numeric matches.
    pub numeric_tolerance: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            critical_fields: ReceiptField::CRITICAL.to_vec(),
            critical_weight: 3.0,
            numeric_tolerance: 0.05,
        }
    }
}

impl ValidationConfig {
    /// Whether a field name belongs to the critical set.
    pub fn is_critical(&self, field: &str) -> bool {
        self.critical_fields.iter().any(|f| f.as_str() == field)
    }
}

/// Corpus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of error patterns kept in a report.
    pub top_errors: usize,

    /// Mean accuracy below which precision is flagged as low.
    pub low_accuracy_threshold: f64,

    /// Upper bound of the "acceptable" band.
    pub acceptable_threshold: f64,

    /// Mean accuracy at which extraction is production-ready.
    pub production_threshold: f64,

    /// Per-field precision below which a field is flagged.
    pub field_precision_threshold: f64,

    /// Precision below which a critical field is flagged.
    pub critical_precision_threshold: f64,

    /// Minimum number of tests for statistically meaningful results.
    pub min_significant_tests: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            top_errors: 10,
            low_accuracy_threshold: 70.0,
            acceptable_threshold: 85.0,
            production_threshold: 95.0,
            field_precision_threshold: 80.0,
            critical_precision_threshold: 90.0,
            min_significant_tests: 10,
        }
    }
}

/// Consumption analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionConfig {
    /// Relative monthly slope above which a trend is reported.
    pub trend_threshold: f64,

    /// Coefficient of variation above which consumption is seasonal.
    pub seasonality_threshold: f64,

    /// Number of months to forecast.
    pub forecast_months: usize,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 0.05,
            seasonality_threshold: 0.2,
            forecast_months: 3,
        }
    }
}

impl CfeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Directory holding the models for the configured language.
    pub fn language_model_dir(&self) -> PathBuf {
        self.ocr.model_dir.join(&self.ocr.language)
    }
}
