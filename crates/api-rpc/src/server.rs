//! JSON-RPC Server
//!
//! Serves the admin surface and the scheduling trigger over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::types::{CleanupRequest, CloneRequest, JobIdRequest, NoParams, ResultRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use queueserver_core::application::EnqueueRequest;
use queueserver_core::domain::JobListQuery;
use queueserver_core::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

// Localhost only: the admin surface has no authentication
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9530;

/// RPC Server Configuration
#[derive(Debug, Clone)]
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

/// Register one async method whose params deserialize into `P`
fn register<P, R, F, Fut>(
    module: &mut RpcModule<()>,
    name: &'static str,
    handler: Arc<RpcHandler>,
    call: F,
) -> Result<()>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Clone + Send + 'static,
    F: Fn(Arc<RpcHandler>, P) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, ErrorObjectOwned>> + Send + 'static,
{
    module
        .register_async_method(name, move |params, _, _| {
            let handler = handler.clone();
            let call = call.clone();
            async move {
                let req: P = params.parse()?;
                call(handler, req).await
            }
        })
        .map_err(|e| AppError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(())
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Build the method table
    pub fn into_module(self) -> Result<RpcModule<()>> {
        let mut module = RpcModule::new(());
        let h = self.handler;

        register(
            &mut module,
            "job.enqueue.v1",
            h.clone(),
            |h, req: EnqueueRequest| async move { h.enqueue(req).await },
        )?;
        register(
            &mut module,
            "job.cancel.v1",
            h.clone(),
            |h, req: JobIdRequest| async move { h.cancel(req).await },
        )?;
        register(
            &mut module,
            "job.clone.v1",
            h.clone(),
            |h, req: CloneRequest| async move { h.clone_job(req).await },
        )?;
        register(
            &mut module,
            "job.get.v1",
            h.clone(),
            |h, req: JobIdRequest| async move { h.get_job(req).await },
        )?;
        register(
            &mut module,
            "job.list.v1",
            h.clone(),
            |h, req: Option<JobListQuery>| async move {
                h.list_jobs(req.unwrap_or_default()).await
            },
        )?;
        register(
            &mut module,
            "job.log.v1",
            h.clone(),
            |h, req: JobIdRequest| async move { h.get_log(req).await },
        )?;
        register(
            &mut module,
            "job.result.v1",
            h.clone(),
            |h, req: ResultRequest| async move { h.get_result(req).await },
        )?;

        // Scheduling trigger
        register(
            &mut module,
            "queue.execute_next.v1",
            h.clone(),
            |h, _: NoParams| async move { h.execute_next().await },
        )?;
        register(
            &mut module,
            "queue.drain.v1",
            h.clone(),
            |h, _: NoParams| async move { h.drain().await },
        )?;

        // Admin
        register(
            &mut module,
            "admin.cleanup.v1",
            h.clone(),
            |h, req: Option<CleanupRequest>| async move {
                h.cleanup(req.unwrap_or_default()).await
            },
        )?;
        register(
            &mut module,
            "admin.stats.v1",
            h,
            |h, _: NoParams| async move { h.stats().await },
        )?;

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to build server on {}: {}", addr, e)))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(format!("Failed to read bound address: {}", e)))?;

        let module = self.into_module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}
