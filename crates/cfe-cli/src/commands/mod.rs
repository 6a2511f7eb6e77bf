//! Subcommands and the helpers they share.

pub mod analyze;
pub mod batch;
pub mod compare;
pub mod config;
pub mod consumption;
pub mod models;
pub mod report;
pub mod validate;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use cfe_core::models::config::CfeConfig;
use cfe_core::{EngineStatus, LopdfExtractor, OcrEngine, PaddleOcrBackend, ReceiptAnalyzer};

/// Analyzer wired to the native OCR backend.
pub type NativeAnalyzer = ReceiptAnalyzer<PaddleOcrBackend, LopdfExtractor>;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cfe")
        .join("config.json")
}

/// Load the configuration from `-c`, the default location, or built-in defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<CfeConfig> {
    if let Some(path) = config_path {
        return CfeConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e));
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(CfeConfig::from_file(&path)?)
    } else {
        Ok(CfeConfig::default())
    }
}

/// Default result store location.
pub fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cfe")
        .join("results")
}

/// Model directory: explicit flag, then the configured directory, then the user data dir.
pub fn model_dir(flag: Option<PathBuf>, config: &CfeConfig) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if config.ocr.model_dir.is_dir() || std::env::var_os("CFE_MODEL_DIR").is_some() {
        return config.ocr.model_dir.clone();
    }
    dirs::data_dir()
        .map(|d| d.join("cfe").join("models"))
        .unwrap_or_else(|| config.ocr.model_dir.clone())
}

/// Build the analyzer and try to bring up the OCR engine.
///
/// A missing or broken model leaves the engine degraded; PDFs with a text layer
/// are still analyzed.
pub async fn build_analyzer(config: &CfeConfig, model_dir: &Path) -> NativeAnalyzer {
    let backend = PaddleOcrBackend::new(model_dir).with_keep_unk(config.ocr.keep_unk);
    let engine = OcrEngine::new(backend, Duration::from_millis(config.ocr.timeout_ms));

    let status = engine.initialize(&config.ocr.language).await;
    if status != EngineStatus::Ready {
        warn!(
            model_dir = %model_dir.display(),
            "OCR engine unavailable ({:?}), images cannot be analyzed",
            status
        );
    }

    ReceiptAnalyzer::new(engine, LopdfExtractor::new()).with_config(config.pdf.clone())
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {}", path.display(), e))
}

/// Write `content` to `output`, or stdout when no path is given.
pub fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!(
                "{} Output written to {}",
                console::style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", content),
    }
    Ok(())
}
