// Pipeline Orchestrator
//
// Runs one pipeline at a time: Ingestion -> Loading -> Initialization ->
// Data enrichment -> AI enrichment. Per-item failures never halt a run;
// a failed ingestion or batch load does.

use super::config::PipelineConfig;
use super::context::RunContext;
use super::loader::BatchLoader;
use super::processor::{IngestionProcessor, StageDeps, StageProcessor};
use super::report::RunReport;
use crate::domain::{Alert, Phase, PipelineEvent, PipelineSnapshot, Severity};
use crate::error::{AppError, Result};
use crate::port::{AlertSink, EnrichmentEngine, IdProvider, JobStore, TimeProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Clears the single-run flag when the run ends (including on panic)
struct ActiveRunGuard {
    flag: Arc<AtomicBool>,
}

impl ActiveRunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Conflict("a pipeline run is already in progress".into()))?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct PipelineOrchestrator {
    alerts: Arc<dyn AlertSink>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    ingestion: IngestionProcessor,
    data: StageProcessor,
    ai: StageProcessor,
    loader: BatchLoader,
    snapshots: Arc<watch::Sender<PipelineSnapshot>>,
    active: Arc<AtomicBool>,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: Arc<dyn EnrichmentEngine>,
        alerts: Arc<dyn AlertSink>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let deps = StageDeps {
            store: store.clone(),
            engine: engine.clone(),
            alerts: alerts.clone(),
            time_provider: time_provider.clone(),
            pacing_delay: config.pacing_delay,
            engine_timeout: config.engine_timeout,
        };
        let (tx, _rx) = watch::channel(PipelineSnapshot::idle());

        Ok(Self {
            ingestion: IngestionProcessor::new(engine, config.engine_timeout),
            data: StageProcessor::data(deps.clone()),
            ai: StageProcessor::ai(deps, config.skip_ai_after_data_error),
            loader: BatchLoader::new(store, config.page_size, config.include_completed),
            alerts,
            time_provider,
            id_provider,
            snapshots: Arc::new(tx),
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Observe snapshots as the run progresses
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.subscribe()
    }

    /// Latest snapshot (the last run's final state once it has ended)
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run the pipeline to completion on the current task.
    ///
    /// Returns `AppError::Conflict` if a run is already in progress.
    pub async fn run(&self) -> Result<RunReport> {
        let _guard = ActiveRunGuard::acquire(&self.active)?;
        Ok(self.execute().await)
    }

    /// Start a run in the background. The conflict check happens before
    /// spawning, so a duplicate trigger fails immediately.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<RunReport>> {
        let guard = ActiveRunGuard::acquire(&self.active)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.execute().await
        }))
    }

    async fn execute(&self) -> RunReport {
        let run_id = self.id_provider.generate_id();
        let mut ctx = RunContext::new(
            run_id,
            self.time_provider.now_millis(),
            self.snapshots.clone(),
        );
        info!(run_id = %ctx.run_id, "Pipeline run started");

        if let Err(e) = self.drive(&mut ctx).await {
            error!(run_id = %ctx.run_id, error = %e, "Pipeline run aborted");
            self.alert(Severity::Critical, format!("Pipeline aborted: {}", e));
            ctx.abort(e.to_string());
        }

        ctx.finish(self.time_provider.now_millis());
        ctx.publish();

        let report = ctx.report();
        info!(
            run_id = %report.run_id,
            state = %report.state,
            items = report.items,
            data_ok = report.data.ok,
            data_error = report.data.error,
            ai_ok = report.ai.ok,
            ai_error = report.ai.error,
            "Pipeline run finished"
        );
        report
    }

    async fn drive(&self, ctx: &mut RunContext) -> Result<()> {
        ctx.apply(PipelineEvent::Start)?;
        ctx.publish();

        match self.ingestion.run().await {
            Ok(outcome) => {
                debug!(run_id = %ctx.run_id, outcome = ?outcome, "Ingestion settled");
                ctx.progress.complete_step();
                ctx.apply(PipelineEvent::IngestionFinished)?;
                ctx.publish();
            }
            Err(e) => {
                let reason = format!("Ingestion failed: {}", e);
                self.alert(Severity::Critical, reason.clone());
                ctx.fail(
                    Phase::Ingestion,
                    PipelineEvent::IngestionFailed(e.to_string()),
                    reason,
                )?;
                return Ok(());
            }
        }

        ctx.apply(PipelineEvent::BeginLoading)?;
        ctx.publish();
        let records = match self.loader.load().await {
            Ok(records) => records,
            Err(e) => {
                let reason = format!("Loading jobs failed: {}", e);
                self.alert(Severity::Critical, reason.clone());
                ctx.fail(
                    Phase::Loading,
                    PipelineEvent::LoadFailed(e.to_string()),
                    reason,
                )?;
                return Ok(());
            }
        };
        ctx.apply(PipelineEvent::BatchLoaded)?;
        ctx.publish();

        ctx.apply(PipelineEvent::BeginInitialization)?;
        let batch = self.loader.select_eligible(records);
        ctx.tracker.initialize(&batch)?;
        let total = ctx.progress.fix_total(batch.len())?;
        ctx.apply(PipelineEvent::StatusesInitialized)?;
        ctx.publish();
        info!(run_id = %ctx.run_id, items = batch.len(), total_steps = total, "Statuses initialized");

        let ids = ctx.tracker.ids();

        ctx.apply(PipelineEvent::BeginDataStage)?;
        ctx.publish();
        for id in &ids {
            self.data.process(ctx, id).await;
        }
        ctx.tracker.set_current(None);
        ctx.apply(PipelineEvent::DataStageFinished)?;
        ctx.publish();

        ctx.apply(PipelineEvent::BeginAiStage)?;
        ctx.publish();
        for id in &ids {
            self.ai.process(ctx, id).await;
        }
        ctx.tracker.set_current(None);
        ctx.apply(PipelineEvent::AiStageFinished)?;

        ctx.apply(PipelineEvent::Finish)?;
        let report = ctx.report();
        self.alert(
            Severity::Info,
            format!(
                "Pipeline complete: {} items, data {} ok / {} failed, AI {} ok / {} failed",
                report.items, report.data.ok, report.data.error, report.ai.ok, report.ai.error
            ),
        );
        Ok(())
    }

    fn alert(&self, severity: Severity, message: String) {
        self.alerts
            .emit(Alert::new(severity, message, self.time_provider.now_millis()));
    }
}
