//! JSON-RPC Server
//!
//! Serves the batch job API over TCP, bound to localhost by default.

use crate::handler::{RateLimitConfig, RpcHandler};
use crate::types::{CreateJobParams, JobIdParams, StatsParams};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use quillforge_core::application::{ActiveUsers, BatchJobService};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9530;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RpcServerError {
    #[error("Failed to build server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register method: {0}")]
    Register(#[from] jsonrpsee::core::RegisterMethodError),
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        service: Arc<BatchJobService>,
        active_users: ActiveUsers,
    ) -> Self {
        let handler = Arc::new(RpcHandler::new(service, active_users, config.rate_limit));
        Self { config, handler }
    }

    /// Bind and start serving; returns the bound address (useful with port 0)
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), RpcServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| RpcServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| RpcServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let module = self.build_module()?;

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, server.start(module)))
    }

    fn build_module(&self) -> Result<RpcModule<()>, RpcServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module.register_async_method("batch.create.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: CreateJobParams = params.parse()?;
                handler.create(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("batch.cancel.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: JobIdParams = params.parse()?;
                handler.cancel(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("batch.pause.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: JobIdParams = params.parse()?;
                handler.pause(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("batch.resume.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: JobIdParams = params.parse()?;
                handler.resume(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("batch.status.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: JobIdParams = params.parse()?;
                handler.status(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("admin.stats.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: StatsParams = params.parse()?;
                handler.stats(req).await
            }
        })?;

        Ok(module)
    }
}
