// Application Layer - Use Cases and Business Logic

pub mod pipeline;
pub mod scheduler;
mod shutdown;

// Re-exports
pub use pipeline::{PipelineConfig, PipelineOrchestrator, RunReport};
pub use scheduler::PipelineScheduler;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
