//! [`CockpitServer`] – binds the control-surface [`router`] to a TCP port.
//!
//! Listens on `0.0.0.0:5000` (configurable via [`CockpitServer::with_port`])
//! and serves HTTP/1.1 plus the `/ws` upgrade until a shutdown future
//! resolves.

use std::future::Future;
use std::net::SocketAddr;

use rover_types::RoverError;
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::{AppContext, router};

/// Default TCP port for the control surface.
pub const DEFAULT_PORT: u16 = 5000;

/// Control-surface server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo(ctx: rover_cockpit::AppContext) -> Result<(), rover_types::RoverError> {
/// use rover_cockpit::CockpitServer;
///
/// CockpitServer::new(ctx)
///     .with_port(8000)
///     .run_until(async { let _ = tokio::signal::ctrl_c().await; })
///     .await
/// # }
/// ```
pub struct CockpitServer {
    ctx: AppContext,
    port: u16,
}

impl CockpitServer {
    /// Create a server for `ctx` on the [`DEFAULT_PORT`].
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).  `0` picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the listener without accepting yet.
    ///
    /// # Errors
    ///
    /// [`RoverError::Channel`] if the port cannot be bound.
    pub async fn bind(self) -> Result<BoundCockpit, RoverError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RoverError::Channel(format!("bind error on {addr}: {e}")))?;
        Ok(BoundCockpit {
            listener,
            ctx: self.ctx,
        })
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RoverError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bind().await?.serve_until(shutdown).await
    }
}

/// A bound, not yet serving, listener.
pub struct BoundCockpit {
    listener: TcpListener,
    ctx: AppContext,
}

impl BoundCockpit {
    pub fn local_addr(&self) -> Result<SocketAddr, RoverError> {
        self.listener
            .local_addr()
            .map_err(|e| RoverError::Channel(e.to_string()))
    }

    /// Serve until `shutdown` resolves, then stop accepting and let
    /// in-flight requests finish.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), RoverError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, "control surface listening");
        axum::serve(self.listener, router(self.ctx))
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("control surface shutting down");
            })
            .await
            .map_err(|e| RoverError::Channel(format!("server error on {addr}: {e}")))
    }
}
