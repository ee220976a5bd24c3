//! RPC Method Handlers
//!
//! Implements the logic behind each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::types::{AlertsRequest, AlertsResponse, ItemsResponse, StartResponse, StatusResponse};
use enrich_core::application::pipeline::constants::ALERT_HISTORY_CAPACITY;
use enrich_core::application::pipeline::{AlertBus, PipelineOrchestrator};
use enrich_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    orchestrator: Arc<PipelineOrchestrator>,
    alerts: Arc<AlertBus>,
}

impl RpcHandler {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, alerts: Arc<AlertBus>) -> Self {
        Self {
            orchestrator,
            alerts,
        }
    }

    /// pipeline.start.v1
    ///
    /// The run continues in the background; observe it with `pipeline.status.v1`.
    pub fn start(&self) -> Result<StartResponse, ErrorObjectOwned> {
        // Conflict (4002) when a run is already active
        self.orchestrator.spawn().map_err(to_rpc_error)?;
        info!("Pipeline run started via RPC");
        Ok(StartResponse { started: true })
    }

    /// pipeline.status.v1
    pub fn status(&self) -> StatusResponse {
        let snapshot = self.orchestrator.snapshot();
        StatusResponse {
            run_id: snapshot.run_id,
            running: self.orchestrator.is_running(),
            state: snapshot.state,
            phases: snapshot.phases,
            progress: snapshot.progress,
            current_item_id: snapshot.current_item_id,
            item_count: snapshot.items.len(),
            started_at: snapshot.started_at,
            finished_at: snapshot.finished_at,
            error: snapshot.error,
        }
    }

    /// pipeline.items.v1
    pub fn items(&self) -> ItemsResponse {
        ItemsResponse {
            items: self.orchestrator.snapshot().items,
        }
    }

    /// alerts.recent.v1
    pub fn recent_alerts(&self, params: AlertsRequest) -> Result<AlertsResponse, ErrorObjectOwned> {
        if params.limit == 0 || params.limit > ALERT_HISTORY_CAPACITY {
            return Err(to_rpc_error(AppError::Validation(format!(
                "limit must be between 1 and {}",
                ALERT_HISTORY_CAPACITY
            ))));
        }

        Ok(AlertsResponse {
            alerts: self.alerts.recent(params.limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use enrich_core::application::pipeline::PipelineConfig;
    use enrich_core::domain::{Alert, JobRecord, PipelineState, Severity};
    use enrich_core::port::enrichment_engine::mocks::MockEnrichmentEngine;
    use enrich_core::port::id_provider::SequentialIdProvider;
    use enrich_core::port::job_store::mocks::InMemoryJobStore;
    use enrich_core::port::time_provider::SystemTimeProvider;
    use enrich_core::port::AlertSink;
    use std::time::Duration;

    fn handler(config: PipelineConfig) -> RpcHandler {
        let store = Arc::new(InMemoryJobStore::with_records(vec![
            JobRecord::new("a", "Backend", 1),
            JobRecord::new("b", "Frontend", 2),
        ]));
        let engine = Arc::new(MockEnrichmentEngine::with_store(store.clone()));
        let alerts = Arc::new(AlertBus::default());
        let orchestrator = Arc::new(
            PipelineOrchestrator::new(
                store,
                engine,
                alerts.clone(),
                Arc::new(SystemTimeProvider),
                Arc::new(SequentialIdProvider::default()),
                config,
            )
            .unwrap(),
        );
        RpcHandler::new(orchestrator, alerts)
    }

    #[tokio::test]
    async fn test_status_before_first_run() {
        let handler = handler(PipelineConfig::unpaced());
        let status = handler.status();

        assert_eq!(status.state, PipelineState::NotStarted);
        assert!(!status.running);
        assert!(status.run_id.is_none());
        assert_eq!(status.progress.percent, 0);
        assert!(handler.items().items.is_empty());
    }

    #[tokio::test]
    async fn test_start_then_conflict() {
        let handler = handler(PipelineConfig {
            pacing_delay: Duration::from_millis(20),
            ..PipelineConfig::default()
        });

        assert!(handler.start().unwrap().started);
        let err = handler.start().unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);

        // Wait for the background run to finish
        let mut rx = handler.orchestrator.subscribe();
        while !rx.borrow().state.is_terminal() {
            rx.changed().await.unwrap();
        }

        let status = handler.status();
        assert_eq!(status.state, PipelineState::Complete);
        assert_eq!(status.item_count, 2);
        assert_eq!(status.progress.percent, 100);
        assert_eq!(handler.items().items.len(), 2);
    }

    #[test]
    fn test_recent_alerts_limit() {
        let handler = handler(PipelineConfig::unpaced());
        for i in 0..5 {
            handler
                .alerts
                .emit(Alert::new(Severity::Warning, format!("alert {}", i), i));
        }

        let recent = handler
            .recent_alerts(AlertsRequest { limit: 2 })
            .unwrap();
        let messages: Vec<&str> = recent.alerts.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(messages, vec!["alert 3", "alert 4"]);

        assert_eq!(handler.recent_alerts(AlertsRequest::default()).unwrap().alerts.len(), 5);

        let err = handler.recent_alerts(AlertsRequest { limit: 0 }).unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }
}
