//! Batch accuracy runs: analyze, validate and commit each document independently.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::{FailureKind, Result};
use crate::models::validation::{GroundTruth, ValidationResult};
use crate::ocr::OcrBackend;
use crate::pdf::PdfTextExtractor;
use crate::receipt::ReceiptAnalyzer;
use crate::store::{
    BatchCompletion, BatchRecord, RecordedError, ResultStore, TestResultRecord,
};
use crate::validation::{MetricsAggregator, ValidationEngine};

/// Default number of documents processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// One document and its expected fields.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub filename: String,
    pub data: Vec<u8>,
    pub truth: GroundTruth,
}

impl BatchItem {
    pub fn new(filename: impl Into<String>, data: Vec<u8>, truth: GroundTruth) -> Self {
        Self {
            filename: filename.into(),
            data,
            truth,
        }
    }
}

/// Completed batch with its per-document records in submission order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch: BatchRecord,
    pub results: Vec<TestResultRecord>,
}

/// Runs a set of documents through analysis and validation.
///
/// Documents are processed concurrently up to a limit; OCR calls stay serialized
/// by the engine. Each result is committed as soon as it is known, so a failing
/// document never discards the ones already stored.
pub struct BatchRunner<B, P> {
    analyzer: Arc<ReceiptAnalyzer<B, P>>,
    store: Arc<dyn ResultStore>,
    validator: ValidationEngine,
    aggregator: MetricsAggregator,
    concurrency: usize,
}

impl<B, P> BatchRunner<B, P>
where
    B: OcrBackend,
    P: PdfTextExtractor + 'static,
{
    pub fn new(analyzer: Arc<ReceiptAnalyzer<B, P>>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            analyzer,
            store,
            validator: ValidationEngine::default(),
            aggregator: MetricsAggregator::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_validator(mut self, validator: ValidationEngine) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_aggregator(mut self, aggregator: MetricsAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Set the number of documents in flight (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, name: &str, items: Vec<BatchItem>) -> Result<BatchOutcome> {
        self.run_with_progress(name, items, |_| {}).await
    }

    /// Run the batch, calling `on_result` as each document finishes.
    pub async fn run_with_progress<F>(
        &self,
        name: &str,
        items: Vec<BatchItem>,
        on_result: F,
    ) -> Result<BatchOutcome>
    where
        F: Fn(&TestResultRecord),
    {
        let batch = self.store.create_batch(name, items.len())?;
        info!(batch_id = %batch.id, name, total = items.len(), "Batch started");

        let filenames: Vec<String> = items.iter().map(|i| i.filename.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let analyzer = Arc::clone(&self.analyzer);
            let store = Arc::clone(&self.store);
            let validator = self.validator.clone();
            let semaphore = Arc::clone(&semaphore);
            let batch_id = batch.id.clone();

            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let record = process_item(&analyzer, &validator, item)
                    .await
                    .with_batch(batch_id);
                (index, commit(store.as_ref(), record))
            });
        }

        let mut slots: Vec<Option<TestResultRecord>> = vec![None; filenames.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => {
                    on_result(&record);
                    slots[index] = Some(record);
                }
                Err(e) => error!(batch_id = %batch.id, error = %e, "Batch task aborted"),
            }
        }

        let mut results = Vec::with_capacity(slots.len());
        for (slot, filename) in slots.into_iter().zip(filenames) {
            let record = match slot {
                Some(record) => record,
                None => {
                    let record = aborted_record(&filename).with_batch(batch.id.clone());
                    let record = commit(self.store.as_ref(), record);
                    on_result(&record);
                    record
                }
            };
            results.push(record);
        }

        let validations: Vec<ValidationResult> = results
            .iter()
            .filter_map(|r| r.validation.clone())
            .collect();
        let succeeded = results.iter().filter(|r| r.error.is_none()).count();
        let failed = results.len() - succeeded;

        let batch = self.store.update_batch(
            &batch.id,
            BatchCompletion {
                succeeded,
                failed,
                metrics: self.aggregator.aggregate(&validations),
            },
        )?;

        info!(
            batch_id = %batch.id,
            status = ?batch.status,
            succeeded,
            failed,
            "Batch finished"
        );
        Ok(BatchOutcome { batch, results })
    }
}

/// Analyze and validate one document; failures become failed records.
async fn process_item<B, P>(
    analyzer: &ReceiptAnalyzer<B, P>,
    validator: &ValidationEngine,
    item: BatchItem,
) -> TestResultRecord
where
    B: OcrBackend,
    P: PdfTextExtractor,
{
    let analyzed = analyzer.analyze_document(&item.data, &item.filename).await;
    match analyzed {
        Ok(extraction) => {
            let validation = validator.validate(
                &extraction.extracted_fields,
                &item.truth,
                extraction.processing_time,
                extraction.confidence,
            );
            TestResultRecord::success(item.filename, extraction, validation)
        }
        Err(e) => {
            warn!(
                filename = %item.filename,
                kind = %e.root_kind(),
                retryable = e.is_retryable(),
                error = %e,
                "Batch item failed"
            );
            TestResultRecord::failure(item.filename, &e)
        }
    }
}

/// Persist a record. A store failure marks the record failed instead of aborting the batch.
fn commit(store: &dyn ResultStore, record: TestResultRecord) -> TestResultRecord {
    match store.create_test_result(record.clone()) {
        Ok(stored) => stored,
        Err(e) => {
            error!(filename = %record.filename, error = %e, "Failed to commit test result");
            TestResultRecord {
                error: Some(RecordedError::from(&e)),
                ..record
            }
        }
    }
}

fn aborted_record(filename: &str) -> TestResultRecord {
    TestResultRecord::failed_with(
        filename,
        RecordedError {
            kind: FailureKind::OcrAnalysisFailed,
            message: "analysis task aborted".to_string(),
        },
    )
}
