// Item Status Tracker
//
// One entry per job in the run's batch, keyed by job ID and kept in load
// order. Mutated field-by-field by the stage processors.

use crate::domain::{DomainError, ItemStatus, JobId, JobRecord, Stage, StageStatus};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ItemStatusTracker {
    order: Vec<JobId>,
    items: HashMap<JobId, ItemStatus>,
    current: Option<JobId>,
    initialized: bool,
}

impl ItemStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the table from the loaded batch (once per run).
    ///
    /// Rejects a second initialization and duplicate IDs; on error the
    /// tracker is left empty.
    pub fn initialize(&mut self, records: &[JobRecord]) -> Result<(), DomainError> {
        if self.initialized {
            return Err(DomainError::ValidationError(
                "item status tracker already initialized".into(),
            ));
        }

        let mut order = Vec::with_capacity(records.len());
        let mut items = HashMap::with_capacity(records.len());
        for record in records {
            if items.contains_key(&record.id) {
                return Err(DomainError::DuplicateItem(record.id.clone()));
            }
            order.push(record.id.clone());
            items.insert(record.id.clone(), ItemStatus::from_record(record));
        }

        self.order = order;
        self.items = items;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Job IDs in load order
    pub fn ids(&self) -> Vec<JobId> {
        self.order.clone()
    }

    pub fn get(&self, id: &str) -> Option<&ItemStatus> {
        self.items.get(id)
    }

    pub fn set_status(
        &mut self,
        id: &str,
        stage: Stage,
        status: StageStatus,
    ) -> Result<(), DomainError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| DomainError::UnknownItem(id.to_string()))?;
        let slot = item.status_mut(stage).ok_or_else(|| {
            DomainError::ValidationError(format!("stage {} has no per-item status", stage))
        })?;
        *slot = Some(status);
        Ok(())
    }

    pub fn set_outdated(&mut self, id: &str, outdated: bool) -> Result<(), DomainError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| DomainError::UnknownItem(id.to_string()))?;
        item.outdated = outdated;
        Ok(())
    }

    /// Advisory pointer to the item being enriched
    pub fn set_current(&mut self, id: Option<JobId>) {
        self.current = id;
    }

    pub fn current(&self) -> Option<&JobId> {
        self.current.as_ref()
    }

    /// Rows in load order
    pub fn snapshot(&self) -> Vec<ItemStatus> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect()
    }

    pub fn count(&self, stage: Stage, status: StageStatus) -> usize {
        self.items
            .values()
            .filter(|item| item.status_for(stage) == Some(status))
            .count()
    }
}
