//! In-process result store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    BatchCompletion, BatchRecord, Pagination, ResultFilter, ResultStore, TestResultRecord, select,
};
use crate::error::{Result, StoreError};

#[derive(Default)]
struct State {
    results: Vec<TestResultRecord>,
    batches: BTreeMap<String, BatchRecord>,
}

/// Result store held in memory; contents are lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()).into())
    }
}

impl ResultStore for MemoryStore {
    fn create_test_result(&self, record: TestResultRecord) -> Result<TestResultRecord> {
        self.write()?.results.push(record.clone());
        Ok(record)
    }

    fn create_batch(&self, name: &str, total: usize) -> Result<BatchRecord> {
        let batch = BatchRecord::new(name, total);
        self.write()?.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn update_batch(&self, id: &str, completion: BatchCompletion) -> Result<BatchRecord> {
        let mut state = self.write()?;
        let batch = state
            .batches
            .get_mut(id)
            .ok_or_else(|| StoreError::BatchNotFound(id.to_string()))?;
        batch.complete(completion);
        Ok(batch.clone())
    }

    fn get_batch(&self, id: &str) -> Result<BatchRecord> {
        self.read()?
            .batches
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::BatchNotFound(id.to_string()).into())
    }

    fn list_batches(&self) -> Result<Vec<BatchRecord>> {
        let mut batches: Vec<BatchRecord> = self.read()?.batches.values().cloned().collect();
        batches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(batches)
    }

    fn list_results(&self, filter: &ResultFilter, page: Pagination) -> Result<Vec<TestResultRecord>> {
        let state = self.read()?;
        Ok(select(state.results.iter().cloned(), filter, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;

    #[test]
    fn memory_store_behaves_as_result_store() {
        fixtures::exercise_store(&MemoryStore::new());
    }

    #[test]
    fn records_are_returned_as_created() {
        let store = MemoryStore::new();
        let record = fixtures::success("recibo.pdf", 95.0);
        let created = store.create_test_result(record.clone()).unwrap();
        assert_eq!(created, record);
    }
}
