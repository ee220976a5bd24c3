// Pipeline configuration

use super::constants::{DEFAULT_ENGINE_TIMEOUT, DEFAULT_PACING_DELAY, DEFAULT_PAGE_SIZE};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Tunables for one orchestrator instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Store page size used by the batch loader
    pub page_size: u32,

    /// Delay before and after each item's engine call
    pub pacing_delay: Duration,

    /// Per-call engine timeout
    pub engine_timeout: Duration,

    /// Force-skip the AI stage for items whose Data stage ended in error
    pub skip_ai_after_data_error: bool,

    /// Keep non-outdated `ai_processed` records in the batch (shown as settled)
    pub include_completed: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pacing_delay: DEFAULT_PACING_DELAY,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            skip_ai_after_data_error: false,
            include_completed: false,
        }
    }
}

impl PipelineConfig {
    /// Configuration without pacing, for tests and local runs
    pub fn unpaced() -> Self {
        Self {
            pacing_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AppError::Config("page_size must be greater than 0".into()));
        }
        if self.engine_timeout.is_zero() {
            return Err(AppError::Config(
                "engine_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(PipelineConfig::unpaced().pacing_delay.is_zero());
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let config = PipelineConfig {
            page_size: 0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = PipelineConfig {
            engine_timeout: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
