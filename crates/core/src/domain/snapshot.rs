// Read models exposed to the presentation layer

use crate::domain::job::JobId;
use crate::domain::pipeline::{PhaseStates, PipelineState};
use crate::domain::status::ItemStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed_steps: u32,
    pub total_steps: u32,
    pub percent: u8,
}

/// Point-in-time view of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub run_id: Option<String>,
    pub state: PipelineState,
    pub phases: PhaseStates,
    pub progress: ProgressSnapshot,
    /// Advisory only (UI highlighting)
    pub current_item_id: Option<JobId>,
    pub items: Vec<ItemStatus>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
}

impl PipelineSnapshot {
    /// Snapshot before any run has been started
    pub fn idle() -> Self {
        Self {
            run_id: None,
            state: PipelineState::NotStarted,
            phases: PipelineState::NotStarted.phases(),
            progress: ProgressSnapshot::default(),
            current_item_id: None,
            items: Vec::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
