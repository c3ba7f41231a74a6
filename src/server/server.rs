//! # Recognition Server
//!
//! Accepts TCP connections and hands each one to its own [`SessionHandler`]
//! task. Connections never coordinate with each other: a failure in one
//! session ends that task and nothing else.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::net::TcpListener;

use super::audit::FileAuditLog;
use super::session::SessionHandler;
use crate::common::config::ServerConfig;
use crate::recognition::encoder::encoder_from_argv;
use crate::recognition::registry::load_registry;
use crate::recognition::{EuclideanComparator, JsonRegistryLoader, Matcher};

pub struct Server {
    listener: TcpListener,
    handler: SessionHandler,
}

impl Server {
    /// Bind the listen socket.
    ///
    /// # Example
    /// ```ignore
    /// let handler = build_handler(&config)?;
    /// let server = Server::bind(&config.server.address, handler).await?;
    /// server.run().await;
    /// ```
    pub async fn bind(address: &str, handler: SessionHandler) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind to {}", address))?;
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("🚀 Server listening on {}", addr),
            Err(e) => error!("❌ Listener has no local address: {}", e),
        }

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    if let Err(e) = socket.set_nodelay(true) {
                        error!("❌ Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        handler.run(socket, peer).await;
                    });
                }
                Err(e) => error!("❌ Accept error: {}", e),
            }
        }
    }
}

/// Assemble the per-connection pipeline from configuration: registry,
/// external encoder, matcher tolerance and the audit log file.
pub fn build_handler(config: &ServerConfig) -> Result<SessionHandler> {
    let registry = load_registry(&JsonRegistryLoader::new(&config.registry.path));
    let encoder = encoder_from_argv(config.recognition.encoder_command.as_deref());
    let audit = FileAuditLog::open(&config.audit.log_path).with_context(|| {
        format!("cannot open access log {}", config.audit.log_path.display())
    })?;
    let matcher = Matcher::new(Arc::new(EuclideanComparator::new(
        config.recognition.tolerance,
    )));

    Ok(SessionHandler::new(registry, encoder, Arc::new(audit))
        .with_matcher(matcher)
        .with_detection_scale(config.recognition.detection_scale)
        .with_max_frame_size(config.limits.max_frame_bytes))
}
