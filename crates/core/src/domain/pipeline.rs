// Pipeline State Machine
//
// A single `PipelineState` replaces per-phase "started"/"finished" flags.
// Every phase's status is derived from it, so a phase can never be both
// running and done, and a phase can never start twice within a run.

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    NotStarted,
    IngestionRunning,
    IngestionDone,
    LoadingRunning,
    LoadingDone,
    InitializingStatuses,
    StatusesReady,
    DataStageRunning,
    DataStageDone,
    AiStageRunning,
    AiStageDone,
    Complete,
    Error,
}

/// Events that drive the orchestrator between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    /// Ingestion succeeded, or the engine reported an equivalent run in progress
    IngestionFinished,
    IngestionFailed(String),
    BeginLoading,
    BatchLoaded,
    LoadFailed(String),
    BeginInitialization,
    StatusesInitialized,
    BeginDataStage,
    DataStageFinished,
    BeginAiStage,
    AiStageFinished,
    Finish,
}

impl PipelineEvent {
    fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Start => "START",
            PipelineEvent::IngestionFinished => "INGESTION_FINISHED",
            PipelineEvent::IngestionFailed(_) => "INGESTION_FAILED",
            PipelineEvent::BeginLoading => "BEGIN_LOADING",
            PipelineEvent::BatchLoaded => "BATCH_LOADED",
            PipelineEvent::LoadFailed(_) => "LOAD_FAILED",
            PipelineEvent::BeginInitialization => "BEGIN_INITIALIZATION",
            PipelineEvent::StatusesInitialized => "STATUSES_INITIALIZED",
            PipelineEvent::BeginDataStage => "BEGIN_DATA_STAGE",
            PipelineEvent::DataStageFinished => "DATA_STAGE_FINISHED",
            PipelineEvent::BeginAiStage => "BEGIN_AI_STAGE",
            PipelineEvent::AiStageFinished => "AI_STAGE_FINISHED",
            PipelineEvent::Finish => "FINISH",
        }
    }
}

impl PipelineState {
    /// Pure transition function `(state, event) -> state'`.
    ///
    /// Each phase may only begin once its predecessor is done; any other
    /// pairing is rejected.
    pub fn apply(self, event: &PipelineEvent) -> Result<PipelineState> {
        use PipelineEvent as E;
        use PipelineState as S;

        let next = match (self, event) {
            (S::NotStarted, E::Start) => S::IngestionRunning,
            (S::IngestionRunning, E::IngestionFinished) => S::IngestionDone,
            (S::IngestionRunning, E::IngestionFailed(_)) => S::Error,
            (S::IngestionDone, E::BeginLoading) => S::LoadingRunning,
            (S::LoadingRunning, E::BatchLoaded) => S::LoadingDone,
            (S::LoadingRunning, E::LoadFailed(_)) => S::Error,
            (S::LoadingDone, E::BeginInitialization) => S::InitializingStatuses,
            (S::InitializingStatuses, E::StatusesInitialized) => S::StatusesReady,
            (S::StatusesReady, E::BeginDataStage) => S::DataStageRunning,
            (S::DataStageRunning, E::DataStageFinished) => S::DataStageDone,
            (S::DataStageDone, E::BeginAiStage) => S::AiStageRunning,
            (S::AiStageRunning, E::AiStageFinished) => S::AiStageDone,
            (S::AiStageDone, E::Finish) => S::Complete,
            (from, event) => {
                return Err(DomainError::InvalidStateTransition {
                    from: from.to_string(),
                    event: event.name().to_string(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Error)
    }

    /// Status of each phase, derived from the single orchestrator state
    pub fn phases(&self) -> PhaseStates {
        use PhaseState::{Done, NotStarted, Running};
        use PipelineState as S;

        let (ingestion, loading, initialization, data, ai) = match self {
            S::NotStarted => (NotStarted, NotStarted, NotStarted, NotStarted, NotStarted),
            S::IngestionRunning => (Running, NotStarted, NotStarted, NotStarted, NotStarted),
            S::IngestionDone => (Done, NotStarted, NotStarted, NotStarted, NotStarted),
            S::LoadingRunning => (Done, Running, NotStarted, NotStarted, NotStarted),
            S::LoadingDone => (Done, Done, NotStarted, NotStarted, NotStarted),
            S::InitializingStatuses => (Done, Done, Running, NotStarted, NotStarted),
            S::StatusesReady => (Done, Done, Done, NotStarted, NotStarted),
            S::DataStageRunning => (Done, Done, Done, Running, NotStarted),
            S::DataStageDone => (Done, Done, Done, Done, NotStarted),
            S::AiStageRunning => (Done, Done, Done, Done, Running),
            S::AiStageDone | S::Complete => (Done, Done, Done, Done, Done),
            // The failing phase is recorded by the orchestrator; see `PhaseStates::with_error`
            S::Error => (NotStarted, NotStarted, NotStarted, NotStarted, NotStarted),
        };

        PhaseStates {
            ingestion,
            loading,
            initialization,
            data_enrichment: data,
            ai_enrichment: ai,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::NotStarted => "NOT_STARTED",
            PipelineState::IngestionRunning => "INGESTION_RUNNING",
            PipelineState::IngestionDone => "INGESTION_DONE",
            PipelineState::LoadingRunning => "LOADING_RUNNING",
            PipelineState::LoadingDone => "LOADING_DONE",
            PipelineState::InitializingStatuses => "INITIALIZING_STATUSES",
            PipelineState::StatusesReady => "STATUSES_READY",
            PipelineState::DataStageRunning => "DATA_STAGE_RUNNING",
            PipelineState::DataStageDone => "DATA_STAGE_DONE",
            PipelineState::AiStageRunning => "AI_STAGE_RUNNING",
            PipelineState::AiStageDone => "AI_STAGE_DONE",
            PipelineState::Complete => "COMPLETE",
            PipelineState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Status of a single phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    NotStarted,
    Running,
    Done,
    Error,
}

/// Named pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ingestion,
    Loading,
    Initialization,
    DataEnrichment,
    AiEnrichment,
}

impl Phase {
    /// Phases in execution order
    pub const ALL: [Phase; 5] = [
        Phase::Ingestion,
        Phase::Loading,
        Phase::Initialization,
        Phase::DataEnrichment,
        Phase::AiEnrichment,
    ];
}

/// Per-phase status table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStates {
    pub ingestion: PhaseState,
    pub loading: PhaseState,
    pub initialization: PhaseState,
    pub data_enrichment: PhaseState,
    pub ai_enrichment: PhaseState,
}

impl PhaseStates {
    /// Phase table for a run that failed in `failed`: earlier phases are done
    pub fn with_error(failed: Phase) -> Self {
        use PhaseState::{Done, Error, NotStarted};

        let failed_idx = Phase::ALL.iter().position(|p| *p == failed).unwrap_or(0);
        let state_at = |idx: usize| match idx.cmp(&failed_idx) {
            std::cmp::Ordering::Less => Done,
            std::cmp::Ordering::Equal => Error,
            std::cmp::Ordering::Greater => NotStarted,
        };

        Self {
            ingestion: state_at(0),
            loading: state_at(1),
            initialization: state_at(2),
            data_enrichment: state_at(3),
            ai_enrichment: state_at(4),
        }
    }

    pub fn get(&self, phase: Phase) -> PhaseState {
        match phase {
            Phase::Ingestion => self.ingestion,
            Phase::Loading => self.loading,
            Phase::Initialization => self.initialization,
            Phase::DataEnrichment => self.data_enrichment,
            Phase::AiEnrichment => self.ai_enrichment,
        }
    }
}
