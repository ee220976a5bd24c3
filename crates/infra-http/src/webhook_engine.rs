// Webhook-based enrichment engine
//
// Each stage is one POST to `{base_url}/{stage path}`. The engine answers
// with an optional JSON body; a non-null `error` field means the call failed.

use async_trait::async_trait;
use enrich_core::domain::Stage;
use enrich_core::port::{EngineError, EnrichmentEngine, ItemRef};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the workflow engine
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Webhook root, e.g. `http://127.0.0.1:5678/webhook`
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout (the pipeline also enforces its own deadline)
    pub request_timeout: Duration,
}

impl HttpEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Serialize)]
struct TriggerRequest<'a> {
    stage: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_ref: Option<&'a str>,
}

/// Webhook path for a stage
pub fn stage_path(stage: Stage) -> &'static str {
    match stage {
        Stage::Ingestion => "ingest-sources",
        Stage::DataEnrichment => "enrich-data",
        Stage::AiEnrichment => "enrich-ai",
    }
}

/// Classify an engine response.
///
/// 2xx with an empty body, a non-JSON body or `{"error": null}` is success.
/// A non-null `error` field or a non-2xx status is a rejection.
pub fn interpret_response(status: u16, body: &str) -> Result<(), EngineError> {
    let reported = reported_error(body);

    if !(200..300).contains(&status) {
        let detail = reported.unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.to_string()
            }
        });
        return Err(EngineError::Rejected(format!("HTTP {}: {}", status, detail)));
    }

    match reported {
        Some(message) => Err(EngineError::Rejected(message)),
        None => Ok(()),
    }
}

/// Message carried by a non-null `error` field, if the body has one
fn reported_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body.trim()).ok()?;
    match value.get("error")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| serde_json::Value::Object(fields.clone()).to_string()),
        ),
        other => Some(other.to_string()),
    }
}

pub struct HttpEnrichmentEngine {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpEnrichmentEngine {
    pub fn new(config: HttpEngineConfig) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url_for(&self, stage: Stage) -> String {
        format!("{}/{}", self.base_url, stage_path(stage))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Transport(format!("request timed out: {}", err))
    } else if err.is_connect() {
        EngineError::Transport(format!("connection failed: {}", err))
    } else {
        EngineError::Transport(err.to_string())
    }
}

#[async_trait]
impl EnrichmentEngine for HttpEnrichmentEngine {
    async fn trigger(&self, stage: Stage, item: Option<&ItemRef>) -> Result<(), EngineError> {
        let url = self.url_for(stage);
        let request = TriggerRequest {
            stage: stage.as_str(),
            job_id: item.map(|i| i.job_id.as_str()),
            external_ref: item.and_then(|i| i.external_ref.as_deref()),
        };

        debug!(stage = %stage, url = %url, job_id = ?request.job_id, "Calling engine webhook");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        let result = interpret_response(status, &body);
        if let Err(e) = &result {
            warn!(stage = %stage, status = status, error = %e, "Engine call rejected");
        }
        result
    }
}
