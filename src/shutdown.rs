use actix_web::dev::ServerHandle;
use sqlx::{Pool, Sqlite};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// HTTP server half of the process, absent in worker-only mode
pub struct ServerParts {
    pub handle: ServerHandle,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

/// Handles graceful shutdown of the application
///
/// On SIGTERM or SIGINT/CTRL+C:
/// 1. Stop the HTTP server (no new submissions)
/// 2. Signal the queue worker; it finishes the job in hand and exits
/// 3. Wait for the worker
/// 4. Close database connections
pub struct ShutdownCoordinator {
    server: Option<ServerParts>,
    worker_handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    pool: Pool<Sqlite>,
}

impl ShutdownCoordinator {
    pub fn new(
        server: Option<ServerParts>,
        worker_handle: Option<JoinHandle<()>>,
        shutdown_tx: watch::Sender<bool>,
        pool: Pool<Sqlite>,
    ) -> Self {
        Self {
            server,
            worker_handle,
            shutdown_tx,
            pool,
        }
    }

    /// Wait for a shutdown signal, then shut everything down in order
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        #[cfg(unix)]
        let terminate = sigterm.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = ctrl_c => {
                result?;
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    /// Perform the actual shutdown sequence
    pub async fn shutdown(self) -> Result<(), std::io::Error> {
        if let Some(server) = &self.server {
            info!("Stopping HTTP server (no longer accepting new requests)...");
            server.handle.stop(true).await;
        }

        info!("Signaling queue worker to stop...");
        if self.shutdown_tx.send(true).is_err() {
            info!("Queue worker already gone");
        }

        if let Some(handle) = self.worker_handle {
            info!("Waiting for queue worker to finish its current job...");
            match handle.await {
                Ok(()) => info!("Queue worker stopped"),
                Err(e) => error!("Queue worker failed to stop: {:?}", e),
            }
        }

        if let Some(server) = self.server {
            match server.task.await {
                Ok(Ok(())) => info!("HTTP server shut down successfully"),
                Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
                Err(e) => error!("HTTP server task panicked: {:?}", e),
            }
        }

        info!("Closing database connection pool...");
        self.pool.close().await;

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
