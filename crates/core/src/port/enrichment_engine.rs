// Enrichment Engine Port
// Abstraction over the external automation engine that performs each stage

use crate::domain::{JobId, Stage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker the engine uses when an equivalent run is already in progress
pub const ALREADY_RUNNING_MARKER: &str = "already running";

/// Identifies the item a per-item stage call targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub job_id: JobId,
    pub external_ref: Option<String>,
}

impl ItemRef {
    pub fn new(job_id: impl Into<String>, external_ref: Option<String>) -> Self {
        Self {
            job_id: job_id.into(),
            external_ref,
        }
    }
}

/// Engine call failure (transport or engine-reported)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Engine rejected call: {0}")]
    Rejected(String),

    #[error("Engine call timed out after {0}ms")]
    Timeout(u64),
}

impl EngineError {
    /// True when the engine reports that an equivalent run is in progress
    pub fn is_already_running(&self) -> bool {
        match self {
            EngineError::Transport(msg) | EngineError::Rejected(msg) => msg
                .to_ascii_lowercase()
                .contains(ALREADY_RUNNING_MARKER),
            EngineError::Timeout(_) => false,
        }
    }
}

/// Enrichment Engine trait
///
/// Implementations:
/// - HttpEnrichmentEngine: webhook calls (infra-http crate)
/// - MockEnrichmentEngine: scripted behavior for tests
#[async_trait]
pub trait EnrichmentEngine: Send + Sync {
    /// Trigger one stage.
    ///
    /// `item` is `None` for the global ingestion stage and `Some` for the
    /// per-item stages. Success carries no payload.
    async fn trigger(&self, stage: Stage, item: Option<&ItemRef>) -> Result<(), EngineError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{JobPatch, ProcessingStage};
    use crate::port::JobStore;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded engine call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EngineCall {
        pub stage: Stage,
        pub job_id: Option<JobId>,
    }

    /// Scripted engine.
    ///
    /// When wired to a store, a successful per-item call first applies any
    /// scripted side-effect patch, then advances the record's stage the way
    /// the real engine does (rejections, e.g. for outdated records, are ignored).
    #[derive(Default)]
    pub struct MockEnrichmentEngine {
        store: Option<Arc<dyn JobStore>>,
        ingestion_error: Mutex<Option<EngineError>>,
        item_errors: Mutex<HashMap<(Stage, JobId), EngineError>>,
        side_effects: Mutex<HashMap<(Stage, JobId), JobPatch>>,
        calls: Mutex<Vec<EngineCall>>,
    }

    impl MockEnrichmentEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Engine that mutates records in `store` on success
        pub fn with_store(store: Arc<dyn JobStore>) -> Self {
            Self {
                store: Some(store),
                ..Self::default()
            }
        }

        pub fn fail_ingestion(&self, message: impl Into<String>) {
            *self.ingestion_error.lock().unwrap() = Some(EngineError::Rejected(message.into()));
        }

        pub fn fail_item(&self, stage: Stage, job_id: impl Into<String>, error: EngineError) {
            self.item_errors
                .lock()
                .unwrap()
                .insert((stage, job_id.into()), error);
        }

        /// Patch applied to the stored record when `stage` succeeds for `job_id`
        pub fn on_success(&self, stage: Stage, job_id: impl Into<String>, patch: JobPatch) {
            self.side_effects
                .lock()
                .unwrap()
                .insert((stage, job_id.into()), patch);
        }

        pub fn calls(&self) -> Vec<EngineCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Job IDs called for a per-item stage, in call order
        pub fn calls_for(&self, stage: Stage) -> Vec<JobId> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.stage == stage)
                .filter_map(|c| c.job_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EnrichmentEngine for MockEnrichmentEngine {
        async fn trigger(&self, stage: Stage, item: Option<&ItemRef>) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push(EngineCall {
                stage,
                job_id: item.map(|i| i.job_id.clone()),
            });

            let item = match item {
                None => {
                    return match self.ingestion_error.lock().unwrap().clone() {
                        Some(err) => Err(err),
                        None => Ok(()),
                    };
                }
                Some(item) => item,
            };

            let key = (stage, item.job_id.clone());
            if let Some(err) = self.item_errors.lock().unwrap().get(&key).cloned() {
                return Err(err);
            }

            if let Some(store) = &self.store {
                let side_effect = self.side_effects.lock().unwrap().get(&key).cloned();
                if let Some(patch) = side_effect {
                    let _ = store.update(&item.job_id, &patch).await;
                }

                let reached = match stage {
                    Stage::DataEnrichment => ProcessingStage::SourceProcessed,
                    _ => ProcessingStage::AiProcessed,
                };
                let _ = store.update(&item.job_id, &JobPatch::stage(reached)).await;
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_detection() {
        assert!(EngineError::Rejected("Workflow already running".into()).is_already_running());
        assert!(EngineError::Transport("409: ALREADY RUNNING".into()).is_already_running());
        assert!(!EngineError::Rejected("workflow crashed".into()).is_already_running());
        assert!(!EngineError::Timeout(1000).is_already_running());
    }
}
