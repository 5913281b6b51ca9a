//! File share server for wiring configuration, components and the listener.
//!
//! This module provides the `FileShareServer` that opens the share root,
//! builds the shared handler state and runs the HTTP listener until its
//! shutdown token is cancelled.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::files::Root;
use crate::router::{self, AppState};

/// The LanShare HTTP server.
pub struct FileShareServer {
    /// Configuration.
    config: Config,
    /// Handler state shared by all requests.
    state: AppState,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl FileShareServer {
    /// Creates a new server, creating the share root if it is missing.
    pub fn new(config: Config) -> Result<Self> {
        let root = Root::open(&config.share.root).with_context(|| {
            format!("Failed to open share root: {}", config.share.root.display())
        })?;

        info!(
            root = %root.path().display(),
            max_upload_bytes = config.share.max_upload_bytes,
            zip_spool_mb = config.share.zip_spool_mb,
            "Share root ready"
        );

        let state = AppState::new(root, &config.share);

        Ok(Self {
            config,
            state,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Returns the configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Builds the application router.
    pub fn app(&self) -> Router {
        router::router(self.state.clone())
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.server.socket_addr()?;
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))
    }

    /// Serves requests on `listener` until the shutdown token is cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!(
            "Serving {} on http://{}",
            self.state.resolver().root().path().display(),
            addr
        );

        axum::serve(listener, self.app())
            .with_graceful_shutdown(self.shutdown_token.clone().cancelled_owned())
            .await
            .context("HTTP server error")?;

        info!("File share server stopped");
        Ok(())
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Requests a graceful shutdown.
    pub fn stop(&self) {
        info!("Stopping file share server...");
        self.shutdown_token.cancel();
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
