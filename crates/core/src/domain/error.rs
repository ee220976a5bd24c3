// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid pipeline state transition: {from} -> {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("Invalid stage transition for job {job_id}: {from} -> {to}")]
    InvalidStageTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Unknown processing stage: {0}")]
    UnknownStage(String),

    #[error("Duplicate item in batch: {0}")]
    DuplicateItem(String),

    #[error("Item not tracked: {0}")]
    UnknownItem(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
