// Periodic pipeline trigger
//
// Starts a run every `interval` until shutdown. A tick that lands while a
// run is still active is skipped.

use crate::application::pipeline::PipelineOrchestrator;
use crate::application::ShutdownToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

pub struct PipelineScheduler {
    orchestrator: Arc<PipelineOrchestrator>,
    interval: Duration,
}

impl PipelineScheduler {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Run the schedule loop (spawn with tokio::spawn)
    ///
    /// The first run starts one interval after the loop begins.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(interval_secs = self.interval.as_secs(), "Pipeline scheduler started");

        let mut tick = interval_at(Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => {
                    info!("Pipeline scheduler shutting down");
                    break;
                }
            }

            match self.orchestrator.spawn() {
                Ok(_handle) => info!("Scheduled pipeline run started"),
                Err(e) if e.is_conflict() => {
                    debug!("Previous run still active, skipping scheduled run")
                }
                Err(e) => error!(error = %e, "Scheduled pipeline run failed to start"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pipeline::{AlertBus, PipelineConfig};
    use crate::application::shutdown_channel;
    use crate::domain::JobRecord;
    use crate::port::enrichment_engine::mocks::MockEnrichmentEngine;
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::domain::Stage;

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_triggers_runs_until_shutdown() {
        let store = Arc::new(InMemoryJobStore::with_records(vec![JobRecord::new(
            "a", "Backend", 1,
        )]));
        let engine = Arc::new(MockEnrichmentEngine::new());
        let orchestrator = Arc::new(
            PipelineOrchestrator::new(
                store,
                engine.clone(),
                Arc::new(AlertBus::default()),
                Arc::new(SystemTimeProvider),
                Arc::new(SequentialIdProvider::default()),
                PipelineConfig::unpaced(),
            )
            .unwrap(),
        );

        let (tx, token) = shutdown_channel();
        let scheduler = PipelineScheduler::new(orchestrator, Duration::from_secs(60));
        let handle = tokio::spawn(scheduler.run(token));

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.shutdown();
        handle.await.unwrap();

        let ingestions = engine
            .calls()
            .iter()
            .filter(|c| c.stage == Stage::Ingestion)
            .count();
        assert_eq!(ingestions, 2);
    }
}
