//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use enrich_core::domain::{Alert, ItemStatus, PhaseStates, PipelineState, ProgressSnapshot};
use serde::{Deserialize, Serialize};

/// pipeline.start.v1 - Start a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub started: bool,
}

/// pipeline.status.v1 - Current run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub run_id: Option<String>,
    pub running: bool,
    pub state: PipelineState,
    pub phases: PhaseStates,
    pub progress: ProgressSnapshot,
    pub current_item_id: Option<String>,
    pub item_count: usize,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
}

/// pipeline.items.v1 - Item status table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<ItemStatus>,
}

/// alerts.recent.v1 - Recent alerts
#[derive(Debug, Deserialize)]
pub struct AlertsRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for AlertsRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    /// Oldest first
    pub alerts: Vec<Alert>,
}
