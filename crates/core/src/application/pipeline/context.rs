// Run Context
//
// Everything one run mutates lives here: the orchestrator owns it and lends
// it `&mut` to each processor call, one item at a time.

use super::progress::ProgressAggregator;
use super::report::{ItemOutcome, RunReport, StageTally};
use super::tracker::ItemStatusTracker;
use crate::domain::{
    DomainError, Phase, PhaseState, PhaseStates, PipelineEvent, PipelineSnapshot, PipelineState,
    Stage,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub struct RunContext {
    pub run_id: String,
    pub tracker: ItemStatusTracker,
    pub progress: ProgressAggregator,
    state: PipelineState,
    failed_phase: Option<Phase>,
    error: Option<String>,
    data_tally: StageTally,
    ai_tally: StageTally,
    started_at: i64,
    finished_at: Option<i64>,
    publisher: Arc<watch::Sender<PipelineSnapshot>>,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        started_at: i64,
        publisher: Arc<watch::Sender<PipelineSnapshot>>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            tracker: ItemStatusTracker::new(),
            progress: ProgressAggregator::new(),
            state: PipelineState::NotStarted,
            failed_phase: None,
            error: None,
            data_tally: StageTally::default(),
            ai_tally: StageTally::default(),
            started_at,
            finished_at: None,
            publisher,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Drive the state machine; illegal transitions leave the state untouched
    pub fn apply(&mut self, event: PipelineEvent) -> Result<PipelineState, DomainError> {
        let next = self.state.apply(&event)?;
        debug!(run_id = %self.run_id, from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        Ok(next)
    }

    /// Enter the `Error` terminal state from `phase`
    pub fn fail(
        &mut self,
        phase: Phase,
        event: PipelineEvent,
        reason: impl Into<String>,
    ) -> Result<PipelineState, DomainError> {
        let next = self.apply(event)?;
        self.failed_phase = Some(phase);
        self.error = Some(reason.into());
        Ok(next)
    }

    /// Force the `Error` state after an unexpected failure, blaming the phase in flight
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.failed_phase.is_none() {
            let phases = self.state.phases();
            self.failed_phase = Phase::ALL
                .iter()
                .copied()
                .find(|p| phases.get(*p) == PhaseState::Running);
        }
        self.state = PipelineState::Error;
        self.error = Some(reason.into());
    }

    pub fn finish(&mut self, now_millis: i64) {
        self.finished_at = Some(now_millis);
        self.tracker.set_current(None);
    }

    /// Count one item's stage outcome as a completed step
    pub fn record_outcome(&mut self, stage: Stage, outcome: &ItemOutcome) {
        match stage {
            Stage::DataEnrichment => self.data_tally.record(outcome),
            Stage::AiEnrichment => self.ai_tally.record(outcome),
            Stage::Ingestion => {}
        }
        self.progress.complete_step();
    }

    pub fn phases(&self) -> PhaseStates {
        match self.failed_phase {
            Some(phase) => PhaseStates::with_error(phase),
            None => self.state.phases(),
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            run_id: Some(self.run_id.clone()),
            state: self.state,
            phases: self.phases(),
            progress: self.progress.snapshot(),
            current_item_id: self.tracker.current().cloned(),
            items: self.tracker.snapshot(),
            started_at: Some(self.started_at),
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }

    /// Push the latest snapshot to observers
    pub fn publish(&self) {
        self.publisher.send_replace(self.snapshot());
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            state: self.state,
            progress: self.progress.snapshot(),
            items: self.tracker.len(),
            data: self.data_tally,
            ai: self.ai_tally,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }
}
