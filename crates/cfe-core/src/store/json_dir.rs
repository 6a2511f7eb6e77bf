//! Result store backed by a directory of JSON files.
//!
//! Layout:
//! - `results/<id>.json` - one file per test result
//! - `batches/<id>.json` - one file per batch
//!
//! Files are written to a temporary file in the same directory and renamed into
//! place, so readers never observe a partially written record.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{
    BatchCompletion, BatchRecord, Pagination, ResultFilter, ResultStore, TestResultRecord, select,
};
use crate::error::{Result, StoreError};

const RESULTS_DIR: &str = "results";
const BATCHES_DIR: &str = "batches";

/// Result store persisting each record as its own JSON file.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `root`, creating its directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [RESULTS_DIR, BATCHES_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| backend(&path, e))?;
        }
        debug!("Opened JSON result store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dir: &str, id: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", id))
    }

    fn write_record<T: Serialize>(&self, dir: &str, id: &str, record: &T) -> Result<()> {
        let dir_path = self.root.join(dir);
        let target = self.record_path(dir, id);

        let tmp = NamedTempFile::new_in(&dir_path).map_err(|e| backend(&dir_path, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.flush().map_err(|e| backend(&target, e))?;
        }
        tmp.persist(&target).map_err(|e| backend(&target, e.error))?;
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path).map_err(|e| backend(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn read_all<T: DeserializeOwned>(&self, dir: &str) -> Result<Vec<T>> {
        let dir_path = self.root.join(dir);
        let mut records = Vec::new();

        for entry in fs::read_dir(&dir_path).map_err(|e| backend(&dir_path, e))? {
            let path = entry.map_err(|e| backend(&dir_path, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            records.push(self.read_record(&path)?);
        }

        Ok(records)
    }
}

fn backend(path: &Path, err: std::io::Error) -> StoreError {
    warn!(path = %path.display(), error = %err, "Result store I/O failed");
    StoreError::Backend(format!("{}: {}", path.display(), err))
}

impl ResultStore for JsonDirStore {
    fn create_test_result(&self, record: TestResultRecord) -> Result<TestResultRecord> {
        self.write_record(RESULTS_DIR, &record.id, &record)?;
        debug!(id = %record.id, filename = %record.filename, "Committed test result");
        Ok(record)
    }

    fn create_batch(&self, name: &str, total: usize) -> Result<BatchRecord> {
        let batch = BatchRecord::new(name, total);
        self.write_record(BATCHES_DIR, &batch.id, &batch)?;
        Ok(batch)
    }

    fn update_batch(&self, id: &str, completion: BatchCompletion) -> Result<BatchRecord> {
        let mut batch = self.get_batch(id)?;
        batch.complete(completion);
        self.write_record(BATCHES_DIR, &batch.id, &batch)?;
        Ok(batch)
    }

    fn get_batch(&self, id: &str) -> Result<BatchRecord> {
        let path = self.record_path(BATCHES_DIR, id);
        if !path.is_file() {
            return Err(StoreError::BatchNotFound(id.to_string()).into());
        }
        self.read_record(&path)
    }

    fn list_batches(&self) -> Result<Vec<BatchRecord>> {
        let mut batches: Vec<BatchRecord> = self.read_all(BATCHES_DIR)?;
        batches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(batches)
    }

    fn list_results(&self, filter: &ResultFilter, page: Pagination) -> Result<Vec<TestResultRecord>> {
        let records: Vec<TestResultRecord> = self.read_all(RESULTS_DIR)?;
        Ok(select(records, filter, page))
    }
}
