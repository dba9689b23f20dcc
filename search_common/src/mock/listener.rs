use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::MockError;

const LOOPBACK: &str = "127.0.0.1:0";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// # Server Handle
///
/// Owns a router served on an ephemeral loopback port. The port is released
/// by `close()`; dropping the handle only signals shutdown.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// Binds `127.0.0.1:0` and starts serving `router` in a background task.
    pub async fn spawn(router: Router) -> Result<Self, MockError> {
        let listener = TcpListener::bind(LOOPBACK).await?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        tracing::debug!(%addr, "mock server listening");
        Ok(Self {
            addr,
            shutdown,
            task: Some(task),
        })
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, `http://127.0.0.1:<port>`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stops accepting, waits for the serve task and releases the port.
    /// Teardown failures are logged.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => tracing::debug!(addr = %self.addr, "mock server closed"),
            Ok(Ok(Err(e))) => tracing::warn!(addr = %self.addr, error = %e, "mock server stopped with error"),
            Ok(Err(e)) => tracing::warn!(addr = %self.addr, error = %e, "mock server task failed"),
            Err(_) => {
                tracing::warn!(addr = %self.addr, "mock server did not stop in time, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
