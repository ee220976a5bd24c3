// Enrichment Stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage executed by the enrichment engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Global source ingestion (one call per run)
    Ingestion,
    /// Per-item data enrichment
    DataEnrichment,
    /// Per-item AI enrichment
    AiEnrichment,
}

impl Stage {
    /// Per-item stages, in execution order
    pub const ITEM_STAGES: [Stage; 2] = [Stage::DataEnrichment, Stage::AiEnrichment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::DataEnrichment => "data_enrichment",
            Stage::AiEnrichment => "ai_enrichment",
        }
    }

    /// Stage runs once per item rather than once per run
    pub fn is_per_item(&self) -> bool {
        !matches!(self, Stage::Ingestion)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
