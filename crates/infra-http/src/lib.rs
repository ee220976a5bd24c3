// Enrich Infrastructure - HTTP Adapters
// Implements: EnrichmentEngine

pub mod webhook_engine;

pub use webhook_engine::{HttpEnrichmentEngine, HttpEngineConfig};
