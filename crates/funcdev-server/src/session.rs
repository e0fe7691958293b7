//! The serving session: listener lifecycle plus table publication.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatch::AppState;
use crate::router::build_router;
use crate::state::SharedRoutes;
use funcdev_common::DevServerError;
use funcdev_core::{Invoker, RoutePublisher, RouteTable};

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Production [`RoutePublisher`]: owns the listener and the live table.
///
/// The first published table binds the listener and starts serving; every
/// later publication only swaps the table, so warm rebuilds never drop the
/// port. [`ServerSession::shutdown`] drains in-flight requests before the
/// listener closes.
pub struct ServerSession {
    addr: SocketAddr,
    routes: SharedRoutes,
    invoker: Invoker,
    request_timeout: Duration,
    running: Mutex<Option<RunningServer>>,
}

impl ServerSession {
    /// Create a session that will bind `addr` on first publication.
    pub fn new(addr: SocketAddr, invoker: Invoker, request_timeout: Duration) -> Self {
        Self {
            addr,
            routes: SharedRoutes::new(),
            invoker,
            request_timeout,
            running: Mutex::new(None),
        }
    }

    /// The bound address, once serving has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|s| s.local_addr)
    }

    /// Drain in-flight requests and close the listener.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        let _ = running.shutdown.send(());
        match running.task.await {
            Ok(Ok(())) => info!("server drained and stopped"),
            Ok(Err(e)) => warn!(error = %e, "server exited with error"),
            Err(e) => warn!(error = %e, "server task panicked"),
        }
    }

    async fn start_serving(&self) -> Result<RunningServer, DevServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        let state = AppState {
            routes: self.routes.clone(),
            invoker: self.invoker.clone(),
        };
        let app = build_router(state, self.request_timeout);

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .into_future(),
        );

        info!(addr = %local_addr, "dev server listening");
        Ok(RunningServer {
            local_addr,
            shutdown,
            task,
        })
    }
}

#[async_trait]
impl RoutePublisher for ServerSession {
    async fn publish(&self, table: RouteTable) -> Result<(), DevServerError> {
        self.routes.swap(table);

        // Publications come from the serialized rebuild loop, so the
        // check-then-bind here never races
        if self.running.lock().is_some() {
            return Ok(());
        }

        let running = self.start_serving().await?;
        *self.running.lock() = Some(running);
        Ok(())
    }
}
