// Stage Processors
//
// IngestionProcessor runs the global ingestion call once per run.
// StageProcessor runs one per-item stage (Data or AI) for one item at a time.

use super::context::RunContext;
use super::report::ItemOutcome;
use crate::domain::{
    Alert, DomainError, ItemStatus, JobPatch, JobRecord, ProcessingStage, Severity, Stage,
    StageStatus,
};
use crate::error::{AppError, Result};
use crate::port::{AlertSink, EngineError, EnrichmentEngine, ItemRef, JobStore, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Run an engine call under a deadline
async fn call_engine(
    engine: &dyn EnrichmentEngine,
    stage: Stage,
    item: Option<&ItemRef>,
    limit: Duration,
) -> std::result::Result<(), EngineError> {
    match timeout(limit, engine.trigger(stage, item)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(limit.as_millis() as u64)),
    }
}

/// How the ingestion call settled (both count as phase success)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    Completed,
    /// The engine reported an equivalent run already in progress
    AlreadyRunning,
}

pub struct IngestionProcessor {
    engine: Arc<dyn EnrichmentEngine>,
    engine_timeout: Duration,
}

impl IngestionProcessor {
    pub fn new(engine: Arc<dyn EnrichmentEngine>, engine_timeout: Duration) -> Self {
        Self {
            engine,
            engine_timeout,
        }
    }

    /// Trigger ingestion. Any error other than "already running" is fatal.
    pub async fn run(&self) -> std::result::Result<IngestionOutcome, EngineError> {
        info!("Triggering source ingestion");
        match call_engine(
            self.engine.as_ref(),
            Stage::Ingestion,
            None,
            self.engine_timeout,
        )
        .await
        {
            Ok(()) => Ok(IngestionOutcome::Completed),
            Err(e) if e.is_already_running() => {
                warn!(error = %e, "Ingestion already running, treating phase as done");
                Ok(IngestionOutcome::AlreadyRunning)
            }
            Err(e) => Err(e),
        }
    }
}

/// Collaborators and tunables shared by the per-item stage processors
#[derive(Clone)]
pub struct StageDeps {
    pub store: Arc<dyn JobStore>,
    pub engine: Arc<dyn EnrichmentEngine>,
    pub alerts: Arc<dyn AlertSink>,
    pub time_provider: Arc<dyn TimeProvider>,
    pub pacing_delay: Duration,
    pub engine_timeout: Duration,
}

/// Per-item stage processor (Data or AI enrichment)
pub struct StageProcessor {
    stage: Stage,
    deps: StageDeps,
    skip_after_data_error: bool,
}

impl StageProcessor {
    pub fn data(deps: StageDeps) -> Self {
        Self {
            stage: Stage::DataEnrichment,
            deps,
            skip_after_data_error: false,
        }
    }

    pub fn ai(deps: StageDeps, skip_after_data_error: bool) -> Self {
        Self {
            stage: Stage::AiEnrichment,
            deps,
            skip_after_data_error,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Process one item and count its outcome as one completed step
    pub async fn process(&self, ctx: &mut RunContext, job_id: &str) -> ItemOutcome {
        let outcome = self.process_item(ctx, job_id).await;
        ctx.record_outcome(self.stage, &outcome);
        ctx.publish();
        outcome
    }

    async fn process_item(&self, ctx: &mut RunContext, job_id: &str) -> ItemOutcome {
        if job_id.trim().is_empty() {
            self.alert(
                Severity::Warning,
                format!("Skipped an item without an ID during {}", self.stage),
                None,
            );
            self.set_status(ctx, job_id, StageStatus::Skipped);
            return ItemOutcome::Skipped;
        }

        let item = match ctx.tracker.get(job_id) {
            Some(item) => item.clone(),
            None => {
                self.alert(
                    Severity::Warning,
                    format!("Item {} is not part of this run", job_id),
                    Some(job_id),
                );
                return ItemOutcome::Skipped;
            }
        };

        // Outdated wins over any status derived from the persisted stage
        if item.outdated {
            info!(job_id = %job_id, stage = %self.stage, "Item outdated, skipping");
            self.set_status(ctx, job_id, StageStatus::Skipped);
            return ItemOutcome::Skipped;
        }

        if let Some(status) = item.status_for(self.stage) {
            debug!(job_id = %job_id, stage = %self.stage, status = %status, "Already settled, skipping");
            return ItemOutcome::Unchanged;
        }

        if self.stage == Stage::AiEnrichment
            && self.skip_after_data_error
            && item.data_status == Some(StageStatus::Error)
        {
            info!(job_id = %job_id, "Data enrichment failed earlier, skipping AI enrichment");
            self.set_status(ctx, job_id, StageStatus::Skipped);
            return ItemOutcome::Skipped;
        }

        self.set_status(ctx, job_id, StageStatus::Processing);
        ctx.tracker.set_current(Some(job_id.to_string()));
        ctx.publish();

        let item_ref = ItemRef::new(job_id, item.external_ref.clone());
        self.pace().await;
        let result = call_engine(
            self.deps.engine.as_ref(),
            self.stage,
            Some(&item_ref),
            self.deps.engine_timeout,
        )
        .await;
        self.pace().await;

        if let Err(e) = result {
            return self.fail(ctx, &item, format!("{} failed: {}", self.stage, e));
        }

        match self.stage {
            Stage::DataEnrichment => self.finish_data(ctx, &item).await,
            _ => self.finish_ai(ctx, &item).await,
        }
    }

    /// The engine may have changed persisted fields (notably `outdated`), so
    /// the record is re-read before deciding between `ok` and `skipped`.
    async fn finish_data(&self, ctx: &mut RunContext, item: &ItemStatus) -> ItemOutcome {
        let record = match self.refresh(item).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return self.fail(ctx, item, "record not found after data enrichment".into())
            }
            Err(e) => return self.fail(ctx, item, format!("refresh failed: {}", e)),
        };

        self.set_outdated(ctx, &item.job_id, record.outdated);
        if record.outdated {
            info!(job_id = %item.job_id, "Record became outdated during data enrichment");
            self.set_status(ctx, &item.job_id, StageStatus::Skipped);
            return ItemOutcome::Skipped;
        }

        if record.processing_stage < ProcessingStage::SourceProcessed {
            if let Err(reason) = self
                .persist_stage(&record.id, ProcessingStage::SourceProcessed)
                .await
            {
                return self.fail(ctx, item, reason);
            }
        }

        self.set_status(ctx, &item.job_id, StageStatus::Ok);
        ItemOutcome::Succeeded
    }

    /// `ai_processed` is only persisted on top of `source_processed`. When the
    /// Data stage never landed, the AI result stays in this run's status table
    /// and the record remains eligible for the next run.
    async fn finish_ai(&self, ctx: &mut RunContext, item: &ItemStatus) -> ItemOutcome {
        let record = match self.refresh(item).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return self.fail(ctx, item, "record not found after AI enrichment".into())
            }
            Err(e) => return self.fail(ctx, item, format!("refresh failed: {}", e)),
        };

        if record.outdated {
            info!(job_id = %item.job_id, "Record outdated, AI result not persisted");
            self.set_outdated(ctx, &item.job_id, true);
            self.set_status(ctx, &item.job_id, StageStatus::Skipped);
            return ItemOutcome::Skipped;
        }

        match record.processing_stage {
            ProcessingStage::Initialized => {
                info!(
                    job_id = %item.job_id,
                    "Data stage not persisted, AI result kept for this run only"
                );
            }
            ProcessingStage::SourceProcessed => {
                match self
                    .deps
                    .store
                    .update(&record.id, &JobPatch::stage(ProcessingStage::AiProcessed))
                    .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        return self.fail(ctx, item, "record not found after AI enrichment".into())
                    }
                    // Turned outdated between the refresh and the write
                    Err(AppError::Domain(DomainError::InvalidStageTransition { .. })) => {
                        info!(job_id = %item.job_id, "Record outdated, AI result not persisted");
                        self.set_outdated(ctx, &item.job_id, true);
                        self.set_status(ctx, &item.job_id, StageStatus::Skipped);
                        return ItemOutcome::Skipped;
                    }
                    Err(e) => {
                        return self.fail(ctx, item, format!("persisting AI stage failed: {}", e))
                    }
                }
            }
            ProcessingStage::AiProcessed => {}
        }

        self.set_status(ctx, &item.job_id, StageStatus::Ok);
        ItemOutcome::Succeeded
    }

    /// Re-read by ID, falling back to the external reference
    async fn refresh(&self, item: &ItemStatus) -> Result<Option<JobRecord>> {
        if let Some(record) = self.deps.store.get_by_id(&item.job_id).await? {
            return Ok(Some(record));
        }
        match &item.external_ref {
            Some(key) => {
                debug!(job_id = %item.job_id, external_ref = %key, "Falling back to alternate key");
                self.deps.store.get_by_alternate_key(key).await
            }
            None => Ok(None),
        }
    }

    async fn persist_stage(
        &self,
        id: &str,
        stage: ProcessingStage,
    ) -> std::result::Result<(), String> {
        match self.deps.store.update(id, &JobPatch::stage(stage)).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(format!("record not found while persisting {}", stage)),
            Err(e) => Err(format!("persisting {} failed: {}", stage, e)),
        }
    }

    fn fail(&self, ctx: &mut RunContext, item: &ItemStatus, reason: String) -> ItemOutcome {
        warn!(job_id = %item.job_id, stage = %self.stage, reason = %reason, "Item failed");
        self.set_status(ctx, &item.job_id, StageStatus::Error);
        self.alert(
            Severity::Error,
            format!("{} ({}): {}", item.title, item.job_id, reason),
            Some(&item.job_id),
        );
        ItemOutcome::Failed(reason)
    }

    fn set_status(&self, ctx: &mut RunContext, job_id: &str, status: StageStatus) {
        if let Err(e) = ctx.tracker.set_status(job_id, self.stage, status) {
            warn!(job_id = %job_id, error = %e, "Status update dropped");
        }
    }

    fn set_outdated(&self, ctx: &mut RunContext, job_id: &str, outdated: bool) {
        if let Err(e) = ctx.tracker.set_outdated(job_id, outdated) {
            warn!(job_id = %job_id, error = %e, "Outdated flag update dropped");
        }
    }

    fn alert(&self, severity: Severity, message: String, job_id: Option<&str>) {
        let mut alert = Alert::new(severity, message, self.deps.time_provider.now_millis());
        if let Some(id) = job_id {
            alert = alert.for_job(id);
        }
        self.deps.alerts.emit(alert);
    }

    async fn pace(&self) {
        if !self.deps.pacing_delay.is_zero() {
            sleep(self.deps.pacing_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pipeline::alert_bus::AlertBus;
    use crate::domain::PipelineSnapshot;
    use crate::port::enrichment_engine::mocks::MockEnrichmentEngine;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::SystemTimeProvider;
    use tokio::sync::watch;

    struct Fixture {
        store: Arc<InMemoryJobStore>,
        engine: Arc<MockEnrichmentEngine>,
        alerts: Arc<AlertBus>,
        ctx: RunContext,
    }

    impl Fixture {
        fn new(records: Vec<JobRecord>) -> Self {
            let store = Arc::new(InMemoryJobStore::with_records(records.clone()));
            let engine = Arc::new(MockEnrichmentEngine::with_store(store.clone()));
            let (tx, _rx) = watch::channel(PipelineSnapshot::idle());
            let mut ctx = RunContext::new("run-test", 0, Arc::new(tx));
            ctx.tracker.initialize(&records).unwrap();
            ctx.progress.fix_total(records.len()).unwrap();
            Self {
                store,
                engine,
                alerts: Arc::new(AlertBus::default()),
                ctx,
            }
        }

        fn deps(&self) -> StageDeps {
            StageDeps {
                store: self.store.clone(),
                engine: self.engine.clone(),
                alerts: self.alerts.clone(),
                time_provider: Arc::new(SystemTimeProvider),
                pacing_delay: Duration::ZERO,
                engine_timeout: Duration::from_secs(5),
            }
        }

        fn status(&self, id: &str) -> ItemStatus {
            self.ctx.tracker.get(id).unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_data_success_marks_ok_and_persists_stage() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Succeeded);
        assert_eq!(fx.status("a").data_status, Some(StageStatus::Ok));
        assert_eq!(
            fx.store.get("a").unwrap().processing_stage,
            ProcessingStage::SourceProcessed
        );
        assert_eq!(fx.ctx.progress.completed(), 1);
        assert_eq!(fx.engine.calls_for(Stage::DataEnrichment), vec!["a"]);
    }

    #[tokio::test]
    async fn test_outdated_item_skipped_without_call() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1).with_outdated(true)]);
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Skipped);
        assert_eq!(fx.status("a").data_status, Some(StageStatus::Skipped));
        assert_eq!(fx.engine.call_count(), 0);
        assert_eq!(fx.ctx.progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_outdated_overrides_settled_status() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)
            .with_stage(ProcessingStage::SourceProcessed)
            .with_outdated(true)]);
        assert_eq!(fx.status("a").data_status, Some(StageStatus::Ok));

        let data = StageProcessor::data(fx.deps())
            .process(&mut fx.ctx, "a")
            .await;
        let ai = StageProcessor::ai(fx.deps(), false)
            .process(&mut fx.ctx, "a")
            .await;

        assert_eq!(data, ItemOutcome::Skipped);
        assert_eq!(ai, ItemOutcome::Skipped);
        let status = fx.status("a");
        assert_eq!(status.data_status, Some(StageStatus::Skipped));
        assert_eq!(status.ai_status, Some(StageStatus::Skipped));
        assert_eq!(fx.engine.call_count(), 0);
        assert_eq!(fx.ctx.progress.completed(), 2);
    }

    #[tokio::test]
    async fn test_settled_item_is_a_no_op() {
        let mut fx = Fixture::new(vec![
            JobRecord::new("a", "Dev", 1).with_stage(ProcessingStage::SourceProcessed)
        ]);
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Unchanged);
        assert_eq!(fx.engine.call_count(), 0);
        assert_eq!(fx.ctx.progress.completed(), 1);
    }

    #[tokio::test]
    async fn test_engine_error_marks_error_and_alerts() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        fx.engine.fail_item(
            Stage::DataEnrichment,
            "a",
            EngineError::Rejected("scraper blocked".into()),
        );
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert!(matches!(outcome, ItemOutcome::Failed(_)));
        assert_eq!(fx.status("a").data_status, Some(StageStatus::Error));
        let alerts = fx.alerts.recent(10);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Error);
        assert!(alerts[0].message.contains("scraper blocked"));
        assert_eq!(
            fx.store.get("a").unwrap().processing_stage,
            ProcessingStage::Initialized
        );
    }

    #[tokio::test]
    async fn test_refetch_outdated_resolves_to_skipped() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        fx.engine
            .on_success(Stage::DataEnrichment, "a", JobPatch::outdated(true));
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Skipped);
        let status = fx.status("a");
        assert_eq!(status.data_status, Some(StageStatus::Skipped));
        assert!(status.outdated);
    }

    #[tokio::test]
    async fn test_missing_record_after_success_is_error() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        fx.store.remove("a");
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert!(matches!(outcome, ItemOutcome::Failed(ref r) if r.contains("not found")));
        assert_eq!(fx.status("a").data_status, Some(StageStatus::Error));
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_external_ref() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1).with_external_ref("ext-a")]);
        // The engine re-keyed the record: only the external reference survives
        fx.store.remove("a");
        fx.store
            .insert(JobRecord::new("a-v2", "Dev", 1).with_external_ref("ext-a"));
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Succeeded);
        assert_eq!(
            fx.store.get("a-v2").unwrap().processing_stage,
            ProcessingStage::SourceProcessed
        );
    }

    #[tokio::test]
    async fn test_ai_success_persists_terminal_stage() {
        let mut fx = Fixture::new(vec![
            JobRecord::new("a", "Dev", 1).with_stage(ProcessingStage::SourceProcessed)
        ]);
        let processor = StageProcessor::ai(fx.deps(), false);

        let outcome = processor.process(&mut fx.ctx, "a").await;

        assert_eq!(outcome, ItemOutcome::Succeeded);
        assert_eq!(fx.status("a").ai_status, Some(StageStatus::Ok));
        assert_eq!(
            fx.store.get("a").unwrap().processing_stage,
            ProcessingStage::AiProcessed
        );
    }

    #[tokio::test]
    async fn test_ai_after_data_error_is_configurable() {
        let records = vec![JobRecord::new("a", "Dev", 1)];

        let mut fx = Fixture::new(records.clone());
        fx.ctx
            .tracker
            .set_status("a", Stage::DataEnrichment, StageStatus::Error)
            .unwrap();
        let outcome = StageProcessor::ai(fx.deps(), true)
            .process(&mut fx.ctx, "a")
            .await;
        assert_eq!(outcome, ItemOutcome::Skipped);
        assert_eq!(fx.engine.call_count(), 0);

        let mut fx = Fixture::new(records);
        fx.ctx
            .tracker
            .set_status("a", Stage::DataEnrichment, StageStatus::Error)
            .unwrap();
        let outcome = StageProcessor::ai(fx.deps(), false)
            .process(&mut fx.ctx, "a")
            .await;
        assert_eq!(outcome, ItemOutcome::Succeeded);
        assert_eq!(fx.engine.calls_for(Stage::AiEnrichment), vec!["a"]);
    }

    #[tokio::test]
    async fn test_ai_success_without_data_stage_keeps_record_eligible() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        fx.ctx
            .tracker
            .set_status("a", Stage::DataEnrichment, StageStatus::Error)
            .unwrap();

        let outcome = StageProcessor::ai(fx.deps(), false)
            .process(&mut fx.ctx, "a")
            .await;

        assert_eq!(outcome, ItemOutcome::Succeeded);
        assert_eq!(fx.status("a").ai_status, Some(StageStatus::Ok));
        assert_eq!(
            fx.store.get("a").unwrap().processing_stage,
            ProcessingStage::Initialized
        );
    }

    #[tokio::test]
    async fn test_ai_refresh_outdated_resolves_to_skipped() {
        let mut fx = Fixture::new(vec![
            JobRecord::new("a", "Dev", 1).with_stage(ProcessingStage::SourceProcessed)
        ]);
        fx.engine
            .on_success(Stage::AiEnrichment, "a", JobPatch::outdated(true));

        let outcome = StageProcessor::ai(fx.deps(), false)
            .process(&mut fx.ctx, "a")
            .await;

        assert_eq!(outcome, ItemOutcome::Skipped);
        let status = fx.status("a");
        assert_eq!(status.ai_status, Some(StageStatus::Skipped));
        assert!(status.outdated);
        assert_eq!(
            fx.store.get("a").unwrap().processing_stage,
            ProcessingStage::SourceProcessed
        );
    }

    #[tokio::test]
    async fn test_empty_id_skipped_with_warning() {
        let mut fx = Fixture::new(vec![JobRecord::new("", "Nameless", 1)]);
        let processor = StageProcessor::data(fx.deps());

        let outcome = processor.process(&mut fx.ctx, "").await;

        assert_eq!(outcome, ItemOutcome::Skipped);
        assert_eq!(fx.engine.call_count(), 0);
        assert_eq!(fx.alerts.recent(1)[0].severity, Severity::Warning);
    }

    struct HangingEngine;

    #[async_trait::async_trait]
    impl EnrichmentEngine for HangingEngine {
        async fn trigger(
            &self,
            _stage: Stage,
            _item: Option<&ItemRef>,
        ) -> std::result::Result<(), EngineError> {
            sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let mut fx = Fixture::new(vec![JobRecord::new("a", "Dev", 1)]);
        let mut deps = fx.deps();
        deps.engine = Arc::new(HangingEngine);
        deps.engine_timeout = Duration::from_millis(20);

        let outcome = StageProcessor::data(deps).process(&mut fx.ctx, "a").await;

        assert!(matches!(outcome, ItemOutcome::Failed(ref r) if r.contains("timed out")));
    }

    #[tokio::test]
    async fn test_ingestion_conflict_is_not_fatal() {
        let engine = Arc::new(MockEnrichmentEngine::new());
        engine.fail_ingestion("workflow already running");
        let ingestion = IngestionProcessor::new(engine, Duration::from_secs(5));
        assert_eq!(ingestion.run().await, Ok(IngestionOutcome::AlreadyRunning));

        let engine = Arc::new(MockEnrichmentEngine::new());
        engine.fail_ingestion("credentials expired");
        let ingestion = IngestionProcessor::new(engine, Duration::from_secs(5));
        assert!(ingestion.run().await.is_err());
    }
}
