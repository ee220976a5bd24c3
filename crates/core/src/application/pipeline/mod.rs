// Enrichment Pipeline
//
// Orchestrator plus the components it drives for one run.

mod alert_bus;
mod config;
pub mod constants;
mod context;
mod loader;
mod orchestrator;
mod processor;
mod progress;
mod report;
mod tracker;

pub use alert_bus::AlertBus;
pub use config::PipelineConfig;
pub use context::RunContext;
pub use loader::BatchLoader;
pub use orchestrator::PipelineOrchestrator;
pub use processor::{IngestionOutcome, IngestionProcessor, StageDeps, StageProcessor};
pub use progress::ProgressAggregator;
pub use report::{ItemOutcome, RunReport, StageTally};
pub use tracker::ItemStatusTracker;
