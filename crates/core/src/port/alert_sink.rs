// Alert Sink Port (notification sinks for surfaced errors)

use crate::domain::{Alert, Severity};
use tracing::{error, info, warn};

/// Receives user-visible alerts emitted by the pipeline
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: Alert);
}

/// Sink that writes alerts to the log (production default)
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn emit(&self, alert: Alert) {
        let job_id = alert.job_id.as_deref().unwrap_or("-");
        match alert.severity {
            Severity::Info => info!(job_id = %job_id, "{}", alert.message),
            Severity::Warning => warn!(job_id = %job_id, "{}", alert.message),
            Severity::Error | Severity::Critical => {
                error!(job_id = %job_id, severity = %alert.severity, "{}", alert.message)
            }
        }
    }
}
