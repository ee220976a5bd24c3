// Domain Layer - Pure business logic and entities

pub mod alert;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod snapshot;
pub mod stage;
pub mod status;

// Re-exports
pub use alert::{Alert, Severity};
pub use error::DomainError;
pub use job::{JobId, JobPatch, JobRecord, ProcessingStage};
pub use pipeline::{Phase, PhaseState, PhaseStates, PipelineEvent, PipelineState};
pub use snapshot::{PipelineSnapshot, ProgressSnapshot};
pub use stage::Stage;
pub use status::{ItemStatus, StageStatus};
