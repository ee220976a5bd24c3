// Item Status Domain Model
//
// In-memory, per-run progress marker for one job. Never persisted.

use crate::domain::job::{JobId, JobRecord, ProcessingStage};
use crate::domain::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-stage outcome for one item. "Not yet attempted" is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Processing,
    Ok,
    Error,
    Skipped,
}

impl StageStatus {
    /// Settled outcomes are never re-attempted within a run
    pub fn is_settled(&self) -> bool {
        !matches!(self, StageStatus::Processing)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Processing => "processing",
            StageStatus::Ok => "ok",
            StageStatus::Error => "error",
            StageStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Per-item status row shown to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub job_id: JobId,
    pub external_ref: Option<String>,
    pub title: String,
    pub created_at: i64,
    pub data_status: Option<StageStatus>,
    pub ai_status: Option<StageStatus>,
    pub outdated: bool,
}

impl ItemStatus {
    /// Derive the initial status from a persisted record.
    ///
    /// `initialized` -> (none, none), `source_processed` -> (ok, none),
    /// `ai_processed` -> (ok, ok). Outdated items are resolved to `skipped`
    /// by the stage processors, not here.
    pub fn from_record(record: &JobRecord) -> Self {
        let (data_status, ai_status) = match record.processing_stage {
            ProcessingStage::Initialized => (None, None),
            ProcessingStage::SourceProcessed => (Some(StageStatus::Ok), None),
            ProcessingStage::AiProcessed => (Some(StageStatus::Ok), Some(StageStatus::Ok)),
        };

        Self {
            job_id: record.id.clone(),
            external_ref: record.external_ref.clone(),
            title: record.title.clone(),
            created_at: record.created_at,
            data_status,
            ai_status,
            outdated: record.outdated,
        }
    }

    /// Status field owned by the given per-item stage
    pub fn status_for(&self, stage: Stage) -> Option<StageStatus> {
        match stage {
            Stage::DataEnrichment => self.data_status,
            Stage::AiEnrichment => self.ai_status,
            Stage::Ingestion => None,
        }
    }

    pub(crate) fn status_mut(&mut self, stage: Stage) -> Option<&mut Option<StageStatus>> {
        match stage {
            Stage::DataEnrichment => Some(&mut self.data_status),
            Stage::AiEnrichment => Some(&mut self.ai_status),
            Stage::Ingestion => None,
        }
    }
}
