// Batch Loader
//
// Reads the job store page by page (always from page zero), merging by ID
// so a record that reappears on a later page replaces its earlier copy.

use super::constants::MAX_LOAD_PAGES;
use crate::domain::{JobId, JobRecord};
use crate::error::{AppError, Result};
use crate::port::JobStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct BatchLoader {
    store: Arc<dyn JobStore>,
    page_size: u32,
    include_completed: bool,
}

impl BatchLoader {
    pub fn new(store: Arc<dyn JobStore>, page_size: u32, include_completed: bool) -> Self {
        Self {
            store,
            page_size,
            include_completed,
        }
    }

    /// Load every record, deduplicated by ID, in first-seen order.
    ///
    /// Stops at the first page shorter than `page_size`.
    pub async fn load(&self) -> Result<Vec<JobRecord>> {
        let mut batch: Vec<JobRecord> = Vec::new();
        let mut index: HashMap<JobId, usize> = HashMap::new();
        let mut page = 0u32;

        loop {
            if page >= MAX_LOAD_PAGES {
                return Err(AppError::InvalidState(format!(
                    "job store returned more than {} full pages",
                    MAX_LOAD_PAGES
                )));
            }

            let records = self.store.list(self.page_size, page).await?;
            let fetched = records.len();

            for record in records {
                match index.get(&record.id) {
                    Some(&pos) => batch[pos] = record,
                    None => {
                        index.insert(record.id.clone(), batch.len());
                        batch.push(record);
                    }
                }
            }

            debug!(page = page, fetched = fetched, "Loaded job page");

            if fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }

        info!(records = batch.len(), pages = page + 1, "Batch loaded");
        Ok(batch)
    }

    /// Drop records with nothing left to enrich.
    ///
    /// `initialized` and `source_processed` records stay (outdated ones too,
    /// so they can be shown as skipped). `ai_processed` records are dropped,
    /// unless `include_completed` is set and the record is not outdated.
    pub fn select_eligible(&self, records: Vec<JobRecord>) -> Vec<JobRecord> {
        let before = records.len();
        let eligible: Vec<JobRecord> = records
            .into_iter()
            .filter(|r| {
                !r.processing_stage.is_terminal() || (self.include_completed && !r.outdated)
            })
            .collect();

        debug!(
            loaded = before,
            eligible = eligible.len(),
            "Filtered batch"
        );
        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobPatch, ProcessingStage};
    use crate::port::job_store::mocks::InMemoryJobStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn seeded(n: usize) -> Arc<InMemoryJobStore> {
        let store = InMemoryJobStore::new();
        for i in 0..n {
            store.insert(JobRecord::new(format!("job-{}", i), format!("Job {}", i), i as i64));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_loads_all_pages() {
        let store = seeded(7);
        let loader = BatchLoader::new(store.clone(), 3, false);

        let batch = loader.load().await.unwrap();
        assert_eq!(batch.len(), 7);
        assert_eq!(batch[0].id, "job-0");
        assert_eq!(batch[6].id, "job-6");
        // pages: 3 + 3 + 1
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_reads_trailing_empty_page() {
        let store = seeded(6);
        let loader = BatchLoader::new(store.clone(), 3, false);

        let batch = loader.load().await.unwrap();
        assert_eq!(batch.len(), 6);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = seeded(0);
        let loader = BatchLoader::new(store, 10, false);
        assert!(loader.load().await.unwrap().is_empty());
    }

    /// Store whose pages overlap, as when records shift between reads
    struct ShiftingStore {
        pages: Mutex<Vec<Vec<JobRecord>>>,
    }

    #[async_trait]
    impl JobStore for ShiftingStore {
        async fn list(&self, _page_size: u32, page: u32) -> Result<Vec<JobRecord>> {
            Ok(self
                .pages
                .lock()
                .unwrap()
                .get(page as usize)
                .cloned()
                .unwrap_or_default())
        }
        async fn get_by_id(&self, _id: &str) -> Result<Option<JobRecord>> {
            Ok(None)
        }
        async fn get_by_alternate_key(&self, _key: &str) -> Result<Option<JobRecord>> {
            Ok(None)
        }
        async fn update(&self, _id: &str, _patch: &JobPatch) -> Result<Option<JobRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_later_page_replaces_earlier_copy() {
        let stale = JobRecord::new("b", "Old title", 2);
        let fresh = JobRecord::new("b", "New title", 2).with_stage(ProcessingStage::SourceProcessed);
        let store = Arc::new(ShiftingStore {
            pages: Mutex::new(vec![
                vec![JobRecord::new("a", "A", 1), stale],
                vec![fresh, JobRecord::new("c", "C", 3)],
                vec![],
            ]),
        });
        let loader = BatchLoader::new(store, 2, false);

        let batch = loader.load().await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(batch[1].title, "New title");
        assert_eq!(batch[1].processing_stage, ProcessingStage::SourceProcessed);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let store = seeded(2);
        store.fail_list("connection reset");
        let loader = BatchLoader::new(store, 10, false);
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_select_eligible() {
        let records = vec![
            JobRecord::new("init", "A", 1),
            JobRecord::new("src", "B", 2).with_stage(ProcessingStage::SourceProcessed),
            JobRecord::new("done", "C", 3).with_stage(ProcessingStage::AiProcessed),
            JobRecord::new("stale", "D", 4).with_outdated(true),
            JobRecord::new("stale-done", "E", 5)
                .with_stage(ProcessingStage::AiProcessed)
                .with_outdated(true),
        ];

        let loader = BatchLoader::new(seeded(0), 10, false);
        let ids: Vec<String> = loader
            .select_eligible(records.clone())
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["init", "src", "stale"]);

        let loader = BatchLoader::new(seeded(0), 10, true);
        let ids: Vec<String> = loader
            .select_eligible(records)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["init", "src", "done", "stale"]);
    }
}
