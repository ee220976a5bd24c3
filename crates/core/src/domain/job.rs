// Job Record Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job ID as issued by the job store
pub type JobId = String;

/// Furthest enrichment stage a record has completed.
///
/// Ordered: `Initialized < SourceProcessed < AiProcessed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Initialized,
    SourceProcessed,
    AiProcessed,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Initialized => "initialized",
            ProcessingStage::SourceProcessed => "source_processed",
            ProcessingStage::AiProcessed => "ai_processed",
        }
    }

    /// Terminal stage: nothing left to enrich
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::AiProcessed)
    }

    /// The only stage this one may advance to
    pub fn next(&self) -> Option<ProcessingStage> {
        match self {
            ProcessingStage::Initialized => Some(ProcessingStage::SourceProcessed),
            ProcessingStage::SourceProcessed => Some(ProcessingStage::AiProcessed),
            ProcessingStage::AiProcessed => None,
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initialized" => Ok(ProcessingStage::Initialized),
            "source_processed" => Ok(ProcessingStage::SourceProcessed),
            "ai_processed" => Ok(ProcessingStage::AiProcessed),
            other => Err(DomainError::UnknownStage(other.to_string())),
        }
    }
}

/// Persisted job posting, owned by the job store.
///
/// Only `processing_stage` and `outdated` drive pipeline behavior; the
/// descriptive fields are carried for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Alternate key (reference issued by the ingestion source)
    pub external_ref: Option<String>,
    pub title: String,
    pub company: Option<String>,
    pub url: Option<String>,
    pub processing_stage: ProcessingStage,
    /// Set by upstream logic; excludes the record from further enrichment
    pub outdated: bool,
    pub created_at: i64, // epoch ms
    pub updated_at: i64, // epoch ms
}

impl JobRecord {
    /// Create a fresh record at `initialized`
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            external_ref: None,
            title: title.into(),
            company: None,
            url: None,
            processing_stage: ProcessingStage::Initialized,
            outdated: false,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    pub fn with_stage(mut self, stage: ProcessingStage) -> Self {
        self.processing_stage = stage;
        self
    }

    pub fn with_outdated(mut self, outdated: bool) -> Self {
        self.outdated = outdated;
        self
    }

    /// Apply a partial update.
    ///
    /// Stages only move forward one step at a time, and an outdated record
    /// never advances. On error the record is left untouched.
    pub fn apply_patch(&mut self, patch: &JobPatch, now_millis: i64) -> Result<()> {
        if let Some(stage) = patch.processing_stage {
            let advancing = stage > self.processing_stage;
            if stage < self.processing_stage
                || (advancing && (self.outdated || Some(stage) != self.processing_stage.next()))
            {
                return Err(DomainError::InvalidStageTransition {
                    job_id: self.id.clone(),
                    from: self.processing_stage.to_string(),
                    to: stage.to_string(),
                });
            }
        }

        if let Some(stage) = patch.processing_stage {
            self.processing_stage = stage;
        }
        if let Some(outdated) = patch.outdated {
            self.outdated = outdated;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        self.updated_at = now_millis;
        Ok(())
    }
}

/// Partial update for a job record (absent fields are left unchanged)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_stage: Option<ProcessingStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl JobPatch {
    pub fn stage(stage: ProcessingStage) -> Self {
        Self {
            processing_stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn outdated(outdated: bool) -> Self {
        Self {
            outdated: Some(outdated),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processing_stage.is_none() && self.outdated.is_none() && self.title.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(ProcessingStage::Initialized < ProcessingStage::SourceProcessed);
        assert!(ProcessingStage::SourceProcessed < ProcessingStage::AiProcessed);
        assert!(ProcessingStage::AiProcessed.is_terminal());
        assert!(!ProcessingStage::SourceProcessed.is_terminal());
    }

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in [
            ProcessingStage::Initialized,
            ProcessingStage::SourceProcessed,
            ProcessingStage::AiProcessed,
        ] {
            assert_eq!(stage.as_str().parse::<ProcessingStage>().unwrap(), stage);
        }
        assert!("done".parse::<ProcessingStage>().is_err());
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessingStage::SourceProcessed).unwrap();
        assert_eq!(json, "\"source_processed\"");
    }

    #[test]
    fn test_patch_advances_stage() {
        let mut job = JobRecord::new("job-1", "Rust Engineer", 1000);
        job.apply_patch(&JobPatch::stage(ProcessingStage::SourceProcessed), 2000)
            .unwrap();
        assert_eq!(job.processing_stage, ProcessingStage::SourceProcessed);
        assert_eq!(job.updated_at, 2000);
    }

    #[test]
    fn test_patch_rejects_regression() {
        let mut job =
            JobRecord::new("job-1", "Rust Engineer", 1000).with_stage(ProcessingStage::AiProcessed);
        let err = job
            .apply_patch(&JobPatch::stage(ProcessingStage::Initialized), 2000)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStageTransition { .. }));
        assert_eq!(job.processing_stage, ProcessingStage::AiProcessed);
        assert_eq!(job.updated_at, 1000);
    }

    #[test]
    fn test_patch_rejects_skipping_a_stage() {
        let mut job = JobRecord::new("job-1", "Rust Engineer", 1000);
        let err = job
            .apply_patch(&JobPatch::stage(ProcessingStage::AiProcessed), 2000)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStageTransition { .. }));
        assert_eq!(job.processing_stage, ProcessingStage::Initialized);

        job.apply_patch(&JobPatch::stage(ProcessingStage::SourceProcessed), 2000)
            .unwrap();
        job.apply_patch(&JobPatch::stage(ProcessingStage::AiProcessed), 3000)
            .unwrap();
        assert_eq!(job.processing_stage, ProcessingStage::AiProcessed);
        assert_eq!(ProcessingStage::AiProcessed.next(), None);
    }

    #[test]
    fn test_outdated_record_never_advances() {
        let mut job = JobRecord::new("job-1", "Rust Engineer", 1000).with_outdated(true);
        let result = job.apply_patch(&JobPatch::stage(ProcessingStage::SourceProcessed), 2000);
        assert!(result.is_err());
        assert_eq!(job.processing_stage, ProcessingStage::Initialized);

        // Same-stage writes and flag changes are still accepted
        job.apply_patch(&JobPatch::stage(ProcessingStage::Initialized), 2000)
            .unwrap();
        job.apply_patch(&JobPatch::outdated(false), 3000).unwrap();
        assert!(!job.outdated);
    }
}
