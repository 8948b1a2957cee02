//! Proxy server setup and lifecycle
//!
//! The server binds either a fixed port or the first free port in a
//! configured range, serves the front-door routes, and shuts down gracefully
//! when asked. Start and stop are mutually exclusive: the running state lives
//! behind a mutex, so a stop can never interleave with a start.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::handlers;
use super::state::ProxyState;
use crate::config::Config;

/// Build the router with all front-door routes
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .fallback(handlers::fallback)
        .with_state(state)
}

/// Where the server currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Stopped,
    Running(SocketAddr),
}

/// A started server: its address, shutdown trigger, and serve task
struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the listening socket and the serve task
pub struct ProxyServer {
    inner: Mutex<Option<RunningServer>>,
}

impl ProxyServer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Bind and start serving; returns the bound address
    ///
    /// Fails if the server is already running or no port could be bound.
    pub async fn start(&self, config: &Config, state: ProxyState) -> Result<SocketAddr> {
        let mut inner = self.inner.lock().await;

        if let Some(running) = inner.as_ref() {
            bail!("Proxy server already running on {}", running.addr);
        }

        let listener = bind_listener(config).await?;
        let addr = listener
            .local_addr()
            .context("Failed to read bound address")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = build_router(state);

        tracing::info!("Proxy listening on {}", addr);

        let handle = tokio::spawn(async move {
            // When shutdown_rx fires, stop accepting connections and finish
            // in-flight requests
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await;

            if let Err(err) = result {
                tracing::error!("Proxy server error: {}", err);
            } else {
                tracing::info!("Proxy server shut down gracefully");
            }
        });

        *inner = Some(RunningServer {
            addr,
            shutdown_tx,
            handle,
        });

        Ok(addr)
    }

    /// Stop the server if it is running; returns whether anything was stopped
    ///
    /// Idempotent - stopping a stopped server is a no-op.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;

        let Some(running) = inner.take() else {
            return false;
        };

        tracing::info!("Stopping proxy server on {}", running.addr);
        let _ = running.shutdown_tx.send(());
        let _ = running.handle.await;
        true
    }

    /// Current status without changing anything
    pub async fn status(&self) -> ProxyStatus {
        match self.inner.lock().await.as_ref() {
            Some(running) => ProxyStatus::Running(running.addr),
            None => ProxyStatus::Stopped,
        }
    }
}

impl Default for ProxyServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Bind the configured fixed port, or scan the range for a free one
async fn bind_listener(config: &Config) -> Result<TcpListener> {
    if let Some(port) = config.port {
        let addr = format!("{}:{}", config.bind_host, port);
        return TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr));
    }

    let (start, end) = config.port_range;
    for port in start..=end {
        let addr = format!("{}:{}", config.bind_host, port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                if port != start {
                    tracing::debug!("Port scan settled on {}", addr);
                }
                return Ok(listener);
            }
            Err(err) => {
                tracing::debug!("Port {} unavailable: {}", port, err);
            }
        }
    }

    bail!(
        "No free port in range {}-{} on {}",
        start,
        end,
        config.bind_host
    )
}
