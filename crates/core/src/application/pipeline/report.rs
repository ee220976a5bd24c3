// Run outcome summary

use crate::domain::{PipelineState, ProgressSnapshot};
use serde::{Deserialize, Serialize};

/// Result of processing one item in one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Engine call succeeded and the item was marked `ok`
    Succeeded,
    /// Engine or store failure; item marked `error`
    Failed(String),
    /// Outdated (or otherwise excluded) item; no engine call
    Skipped,
    /// Status was already settled; nothing to do
    Unchanged,
}

/// Per-stage outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTally {
    pub ok: u32,
    pub error: u32,
    pub skipped: u32,
    pub unchanged: u32,
}

impl StageTally {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.ok += 1,
            ItemOutcome::Failed(_) => self.error += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.ok + self.error + self.skipped + self.unchanged
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub state: PipelineState,
    pub progress: ProgressSnapshot,
    pub items: usize,
    pub data: StageTally,
    pub ai: StageTally,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// Reason the run halted, when `state` is `ERROR`
    pub error: Option<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Complete
    }
}
