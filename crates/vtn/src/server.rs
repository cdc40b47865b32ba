//! VTN server lifecycle: bind, serve, shut down.
//!
//! Wraps the dispatcher and the axum service in a spawned task with a
//! graceful-shutdown channel. Binding to port 0 is supported for tests;
//! [`VtnServer::local_addr`] reports the bound address either way.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::VtnConfig;
use crate::dispatch::{Dispatcher, EventTag, HandlerRegistry};
use crate::service;

/// A running VTN HTTP server.
pub struct VtnServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl VtnServer {
    /// Binds `addr` and starts serving the well-known service paths.
    ///
    /// A server without a registration handler denies every
    /// registration; that is a legal configuration, so it gets one
    /// warning here rather than noise on every request.
    pub async fn start(
        config: VtnConfig,
        registry: HandlerRegistry,
        addr: SocketAddr,
    ) -> anyhow::Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(config, registry));
        if !dispatcher.has_handler(EventTag::CreatePartyRegistration) {
            warn!(
                "no on_create_party_registration handler is installed; \
                 all registration requests will be denied"
            );
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound address")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = service::router(dispatcher);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "HTTP server terminated");
            }
        });

        info!(%local_addr, "VTN listening");
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should target, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}/{}", self.local_addr, protocol::SERVICE_PREFIX)
    }

    /// Stops accepting connections and waits for in-flight requests to
    /// drain. Registry and replay state are dropped with the server.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!(error = %e, "server task join failed");
        }
        info!("VTN stopped");
    }
}
