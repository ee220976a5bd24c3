//! JSON-RPC Server
//!
//! Serves the JSON-RPC 2.0 API over TCP on localhost.

use crate::handler::RpcHandler;
use crate::types::AlertsRequest;
use enrich_core::application::pipeline::{AlertBus, PipelineOrchestrator};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9531;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        orchestrator: Arc<PipelineOrchestrator>,
        alerts: Arc<AlertBus>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(orchestrator, alerts)),
        }
    }

    /// Start the JSON-RPC server, returning the bound address and its handle
    ///
    /// Security: binds to the configured host, 127.0.0.1 by default (no external access)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        // Register methods
        let handler = self.handler.clone();
        module
            .register_method("pipeline.start.v1", move |_, _, _| handler.start())
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_method("pipeline.status.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.status())
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_method("pipeline.items.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.items())
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_method("alerts.recent.v1", move |params, _, _| {
                let req: Option<AlertsRequest> = params.parse()?;
                handler.recent_alerts(req.unwrap_or_default())
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
