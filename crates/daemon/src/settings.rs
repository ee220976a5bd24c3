//! Daemon settings
//!
//! Built-in defaults overridden by `ENRICH_*` environment variables
//! (e.g. `ENRICH_DB_PATH`, `ENRICH_RPC_PORT`, `ENRICH_PACING_MS`).

use anyhow::{Context, Result};
use config::{Config, Environment};
use enrich_core::application::PipelineConfig;
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "ENRICH";
const DEFAULT_DB_PATH: &str = "~/.enrich/jobs.db";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub engine_base_url: String,
    pub page_size: u32,
    pub pacing_ms: u64,
    pub engine_timeout_secs: u64,
    pub skip_ai_after_data_error: bool,
    pub run_on_start: bool,
    /// 0 disables the periodic trigger
    pub run_interval_secs: u64,
}

impl DaemonConfig {
    /// Load from defaults and the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("rpc_host", "127.0.0.1")?
            .set_default("rpc_port", 9531)?
            .set_default("engine_base_url", "http://127.0.0.1:5678/webhook")?
            .set_default("page_size", 50)?
            .set_default("pacing_ms", 500)?
            .set_default("engine_timeout_secs", 300)?
            .set_default("skip_ai_after_data_error", false)?
            .set_default("run_on_start", false)?
            .set_default("run_interval_secs", 0)?
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let mut cfg: DaemonConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.db_path = shellexpand::tilde(&cfg.db_path).into_owned();
        Ok(cfg)
    }

    /// sqlx connection URL for `db_path`
    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            page_size: self.page_size,
            pacing_delay: Duration::from_millis(self.pacing_ms),
            engine_timeout: Duration::from_secs(self.engine_timeout_secs),
            skip_ai_after_data_error: self.skip_ai_after_data_error,
            ..PipelineConfig::default()
        }
    }

    pub fn run_interval(&self) -> Option<Duration> {
        (self.run_interval_secs > 0).then(|| Duration::from_secs(self.run_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::load(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    #[test]
    fn test_defaults() {
        let cfg = load_with(&[]).unwrap();

        assert_eq!(cfg.rpc_host, "127.0.0.1");
        assert_eq!(cfg.rpc_port, 9531);
        assert_eq!(cfg.page_size, 50);
        assert!(!cfg.db_path.starts_with('~'));
        assert!(cfg.db_path.ends_with(".enrich/jobs.db"));
        assert!(cfg.run_interval().is_none());

        let pipeline = cfg.pipeline_config();
        assert_eq!(pipeline.pacing_delay, Duration::from_millis(500));
        assert_eq!(pipeline.engine_timeout, Duration::from_secs(300));
        assert!(!pipeline.skip_ai_after_data_error);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = load_with(&[
            ("ENRICH_RPC_PORT", "9999"),
            ("ENRICH_PACING_MS", "0"),
            ("ENRICH_SKIP_AI_AFTER_DATA_ERROR", "true"),
            ("ENRICH_RUN_INTERVAL_SECS", "3600"),
            ("ENRICH_DB_PATH", "sqlite::memory:"),
        ])
        .unwrap();

        assert_eq!(cfg.rpc_port, 9999);
        assert_eq!(cfg.pacing_ms, 0);
        assert!(cfg.skip_ai_after_data_error);
        assert_eq!(cfg.run_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.database_url(), "sqlite::memory:");
    }

    #[test]
    fn test_invalid_value_rejected() {
        assert!(load_with(&[("ENRICH_RPC_PORT", "not-a-port")]).is_err());
    }
}
