//! Result store boundary: persisted test results and batches.

mod json_dir;
mod memory;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CfeError, FailureKind, Result};
use crate::models::metrics::MetricsReport;
use crate::models::receipt::ExtractionResult;
use crate::models::validation::ValidationResult;
use crate::validation::MetricsAggregator;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Time-ordered identifier, unique within a process and unlikely to collide across processes.
pub fn new_id(prefix: &str) -> String {
    format!(
        "{}-{}-{}-{:08}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        std::process::id(),
        ID_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Structured failure stored with a result that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedError {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&CfeError> for RecordedError {
    fn from(err: &CfeError) -> Self {
        Self {
            kind: err.root_kind(),
            message: err.to_string(),
        }
    }
}

/// One tested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultRecord {
    pub id: String,
    pub batch_id: Option<String>,
    pub filename: String,
    pub extraction: Option<ExtractionResult>,
    pub validation: Option<ValidationResult>,
    pub error: Option<RecordedError>,
    pub created_at: DateTime<Utc>,
}

impl TestResultRecord {
    pub fn success(
        filename: impl Into<String>,
        extraction: ExtractionResult,
        validation: ValidationResult,
    ) -> Self {
        Self {
            id: new_id("result"),
            batch_id: None,
            filename: filename.into(),
            extraction: Some(extraction),
            validation: Some(validation),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failure(filename: impl Into<String>, err: &CfeError) -> Self {
        Self::failed_with(filename, RecordedError::from(err))
    }

    pub fn failed_with(filename: impl Into<String>, error: RecordedError) -> Self {
        Self {
            id: new_id("result"),
            batch_id: None,
            filename: filename.into(),
            extraction: None,
            validation: None,
            error: Some(error),
            created_at: Utc::now(),
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.validation.as_ref().map(|v| v.overall_accuracy)
    }
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    Running,
    Completed,
    PartiallyFailed,
    Failed,
}

impl BatchStatus {
    /// Final status from item outcomes.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => BatchStatus::Completed,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::PartiallyFailed,
        }
    }
}

/// A group of test results run together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub metrics: Option<MetricsReport>,
}

impl BatchRecord {
    pub fn new(name: impl Into<String>, total: usize) -> Self {
        Self {
            id: new_id("batch"),
            name: name.into(),
            created_at: Utc::now(),
            completed_at: None,
            status: BatchStatus::Running,
            total,
            succeeded: 0,
            failed: 0,
            metrics: None,
        }
    }

    /// Apply a completion, stamping `completed_at`.
    pub fn complete(&mut self, completion: BatchCompletion) {
        self.status = BatchStatus::from_counts(completion.succeeded, completion.failed);
        self.succeeded = completion.succeeded;
        self.failed = completion.failed;
        self.metrics = Some(completion.metrics);
        self.completed_at = Some(Utc::now());
    }
}

/// Final counts and metrics written to a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCompletion {
    pub succeeded: usize,
    pub failed: usize,
    pub metrics: MetricsReport,
}

/// Selects stored results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub batch_id: Option<String>,
    /// Excludes results without a validation.
    pub min_accuracy: Option<f64>,
    pub since: Option<DateTime<Utc>>,
}

impl ResultFilter {
    pub fn matches(&self, record: &TestResultRecord) -> bool {
        if let Some(batch_id) = &self.batch_id {
            if record.batch_id.as_ref() != Some(batch_id) {
                return false;
            }
        }
        if let Some(min) = self.min_accuracy {
            if !record.accuracy().is_some_and(|a| a >= min) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        true
    }
}

/// Offset/limit window over results ordered by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    fn apply(&self, records: Vec<TestResultRecord>) -> Vec<TestResultRecord> {
        let rest = records.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rest.take(limit).collect(),
            None => rest.collect(),
        }
    }
}

/// Select, order and page records.
pub(crate) fn select(
    records: impl IntoIterator<Item = TestResultRecord>,
    filter: &ResultFilter,
    page: Pagination,
) -> Vec<TestResultRecord> {
    let mut selected: Vec<TestResultRecord> =
        records.into_iter().filter(|r| filter.matches(r)).collect();
    selected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    page.apply(selected)
}

/// Persistence for test results and batches.
///
/// Every `create_test_result` commits on its own, so a failing batch never loses
/// results already written.
pub trait ResultStore: Send + Sync {
    fn create_test_result(&self, record: TestResultRecord) -> Result<TestResultRecord>;

    fn create_batch(&self, name: &str, total: usize) -> Result<BatchRecord>;

    /// Mark a batch finished. Fails with `BatchNotFound` for unknown ids.
    fn update_batch(&self, id: &str, completion: BatchCompletion) -> Result<BatchRecord>;

    fn get_batch(&self, id: &str) -> Result<BatchRecord>;

    fn list_batches(&self) -> Result<Vec<BatchRecord>>;

    fn list_results(&self, filter: &ResultFilter, page: Pagination) -> Result<Vec<TestResultRecord>>;

    /// Aggregate the validations of matching results created within `window`.
    fn aggregate_metrics(
        &self,
        filter: &ResultFilter,
        window: Option<Duration>,
        aggregator: &MetricsAggregator,
    ) -> Result<MetricsReport> {
        let mut filter = filter.clone();
        // A window reaching past the earliest representable time keeps everything.
        if let Some(cutoff) = window.and_then(|w| Utc::now().checked_sub_signed(w)) {
            filter.since = Some(filter.since.map_or(cutoff, |since| since.max(cutoff)));
        }

        let validations: Vec<ValidationResult> = self
            .list_results(&filter, Pagination::all())?
            .into_iter()
            .filter_map(|record| record.validation)
            .collect();

        Ok(aggregator.aggregate(&validations))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::receipt::{ExtractedFields, ExtractionSource};
    use crate::models::validation::ValidationSummary;

    pub(crate) fn validation(accuracy: f64) -> ValidationResult {
        ValidationResult {
            overall_accuracy: accuracy,
            field_results: Default::default(),
            summary: ValidationSummary::default(),
            confidence: 0.9,
            processing_time: 50,
            errors: Vec::new(),
        }
    }

    pub(crate) fn extraction(filename: &str) -> ExtractionResult {
        ExtractionResult {
            filename: filename.to_string(),
            raw_text: String::new(),
            confidence: 0.9,
            extracted_fields: ExtractedFields::new(),
            source: ExtractionSource::PrimaryTextLayer,
            processing_time: 50,
            warnings: Vec::new(),
            usable: false,
        }
    }

    pub(crate) fn success(filename: &str, accuracy: f64) -> TestResultRecord {
        TestResultRecord::success(filename, extraction(filename), validation(accuracy))
    }

    /// Exercise a store through the trait; shared by every implementation's tests.
    pub(crate) fn exercise_store(store: &dyn ResultStore) {
        let batch = store.create_batch("enero", 3).unwrap();
        assert_eq!(batch.status, BatchStatus::Running);

        store
            .create_test_result(success("a.pdf", 100.0).with_batch(&batch.id))
            .unwrap();
        store
            .create_test_result(success("b.pdf", 60.0).with_batch(&batch.id))
            .unwrap();
        store
            .create_test_result(
                TestResultRecord::failure("c.png", &CfeError::OcrNotReady("degraded".into()))
                    .with_batch(&batch.id),
            )
            .unwrap();
        store.create_test_result(success("other.pdf", 10.0)).unwrap();

        let in_batch = ResultFilter {
            batch_id: Some(batch.id.clone()),
            ..Default::default()
        };
        let listed = store.list_results(&in_batch, Pagination::all()).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(
            listed.iter().map(|r| r.filename.as_str()).collect::<Vec<_>>(),
            vec!["a.pdf", "b.pdf", "c.png"]
        );
        assert_eq!(
            listed[2].error.as_ref().map(|e| e.kind),
            Some(FailureKind::OcrNotReady)
        );

        let page = store.list_results(&in_batch, Pagination::new(1, 1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].filename, "b.pdf");

        let accurate = ResultFilter {
            min_accuracy: Some(50.0),
            ..Default::default()
        };
        assert_eq!(store.list_results(&accurate, Pagination::all()).unwrap().len(), 2);

        let metrics = store
            .aggregate_metrics(&in_batch, Some(Duration::days(1)), &MetricsAggregator::default())
            .unwrap();
        assert_eq!(metrics.total_tests, 2);
        assert_eq!(metrics.avg_accuracy, 80.0);

        let unbounded = store
            .aggregate_metrics(&in_batch, Duration::try_days(i64::MAX / 86_400_000), &MetricsAggregator::default())
            .unwrap();
        assert_eq!(unbounded.total_tests, 2);

        let updated = store
            .update_batch(
                &batch.id,
                BatchCompletion {
                    succeeded: 2,
                    failed: 1,
                    metrics: metrics.clone(),
                },
            )
            .unwrap();
        assert_eq!(updated.status, BatchStatus::PartiallyFailed);
        assert!(updated.completed_at.is_some());
        assert_eq!(store.get_batch(&batch.id).unwrap(), updated);
        assert_eq!(store.list_batches().unwrap().len(), 1);

        let missing = store.update_batch(
            "batch-missing",
            BatchCompletion {
                succeeded: 0,
                failed: 0,
                metrics,
            },
        );
        assert_eq!(missing.unwrap_err().kind(), FailureKind::Storage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_from_counts() {
        assert_eq!(BatchStatus::from_counts(3, 0), BatchStatus::Completed);
        assert_eq!(BatchStatus::from_counts(0, 0), BatchStatus::Completed);
        assert_eq!(BatchStatus::from_counts(0, 2), BatchStatus::Failed);
        assert_eq!(BatchStatus::from_counts(1, 2), BatchStatus::PartiallyFailed);
    }

    #[test]
    fn ids_are_unique() {
        let a = new_id("result");
        let b = new_id("result");
        assert_ne!(a, b);
        assert!(a.starts_with("result-"));
    }

    #[test]
    fn old_results_fall_outside_window() {
        let mut old = fixtures::success("old.pdf", 10.0);
        old.created_at = Utc::now() - Duration::days(30);
        let recent = fixtures::success("new.pdf", 90.0);

        let filter = ResultFilter {
            since: Some(Utc::now() - Duration::days(7)),
            ..Default::default()
        };
        let selected = select(vec![old, recent], &filter, Pagination::all());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].filename, "new.pdf");
    }
}
