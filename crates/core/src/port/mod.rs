// Port Layer - Interfaces for external collaborators

pub mod alert_sink;
pub mod enrichment_engine;
pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod time_provider;

// Re-exports
pub use alert_sink::{AlertSink, TracingAlertSink};
pub use enrichment_engine::{EngineError, EnrichmentEngine, ItemRef, ALREADY_RUNNING_MARKER};
pub use id_provider::IdProvider;
pub use job_store::JobStore;
pub use time_provider::TimeProvider;
