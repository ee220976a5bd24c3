// Job Store Port (Interface)

use crate::domain::{JobPatch, JobRecord};
use crate::error::Result;
use async_trait::async_trait;

/// Durable owner of job records.
///
/// The pipeline only holds snapshots; after any mutating engine call the
/// record must be re-read through this port.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Read one page of records (`page` is zero-based).
    ///
    /// Returns fewer than `page_size` records only on the last page.
    async fn list(&self, page_size: u32, page: u32) -> Result<Vec<JobRecord>>;

    /// Find record by internal ID
    async fn get_by_id(&self, id: &str) -> Result<Option<JobRecord>>;

    /// Find record by its external reference
    async fn get_by_alternate_key(&self, key: &str) -> Result<Option<JobRecord>>;

    /// Apply a partial update, returning the updated record (`None` if absent)
    async fn update(&self, id: &str, patch: &JobPatch) -> Result<Option<JobRecord>>;
}

// ============================================================================
// In-memory implementation for testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory job store (insertion order = list order)
    #[derive(Default)]
    pub struct InMemoryJobStore {
        records: Mutex<Vec<JobRecord>>,
        list_error: Mutex<Option<String>>,
        list_calls: Mutex<usize>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_records(records: Vec<JobRecord>) -> Self {
            let store = Self::new();
            *store.records.lock().unwrap() = records;
            store
        }

        pub fn insert(&self, record: JobRecord) {
            self.records.lock().unwrap().push(record);
        }

        pub fn records(&self) -> Vec<JobRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn get(&self, id: &str) -> Option<JobRecord> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
        }

        /// Remove a record (simulates deletion behind the pipeline's back)
        pub fn remove(&self, id: &str) {
            self.records.lock().unwrap().retain(|r| r.id != id);
        }

        /// Make every subsequent `list` call fail with the given message
        pub fn fail_list(&self, message: impl Into<String>) {
            *self.list_error.lock().unwrap() = Some(message.into());
        }

        pub fn list_calls(&self) -> usize {
            *self.list_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn list(&self, page_size: u32, page: u32) -> Result<Vec<JobRecord>> {
            *self.list_calls.lock().unwrap() += 1;
            if let Some(msg) = self.list_error.lock().unwrap().clone() {
                return Err(AppError::Database(msg));
            }

            let start = (page_size as usize) * (page as usize);
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .collect())
        }

        async fn get_by_id(&self, id: &str) -> Result<Option<JobRecord>> {
            Ok(self.get(id))
        }

        async fn get_by_alternate_key(&self, key: &str) -> Result<Option<JobRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.external_ref.as_deref() == Some(key))
                .cloned())
        }

        async fn update(&self, id: &str, patch: &JobPatch) -> Result<Option<JobRecord>> {
            let now = chrono::Utc::now().timestamp_millis();
            let mut records = self.records.lock().unwrap();
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) => {
                    record.apply_patch(patch, now)?;
                    Ok(Some(record.clone()))
                }
                None => Ok(None),
            }
        }
    }
}
