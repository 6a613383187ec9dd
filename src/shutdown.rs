use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::JobEngine;

/// Handles graceful shutdown of the application
///
/// Shutdown proceeds in order:
/// 1. Listen for SIGTERM or SIGINT/CTRL+C
/// 2. Stop the HTTP server so no new jobs arrive
/// 3. Signal running passes to stop at their next batch boundary
/// 4. Wait for those passes, up to a timeout
/// 5. Close the job store
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    engine: Arc<JobEngine>,
    shutdown_tx: watch::Sender<bool>,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        engine: Arc<JobEngine>,
        shutdown_tx: watch::Sender<bool>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            engine,
            shutdown_tx,
            drain_timeout,
        }
    }

    /// Wait for a shutdown signal, then shut down gracefully
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for CTRL+C: {:?}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM signal handler: {:?}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<(), std::io::Error> {
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        info!("Signaling running jobs to stop at the next batch boundary...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal to jobs: {:?}", e);
        }

        let running = self.engine.running_jobs();
        info!("Waiting for {} running jobs to reach a batch boundary...", running);
        match tokio::time::timeout(self.drain_timeout, self.engine.wait_idle()).await {
            Ok(()) => info!("All running jobs stopped"),
            Err(_) => warn!(
                "{} jobs still running after {:?}; they will be recovered on next start",
                self.engine.running_jobs(),
                self.drain_timeout
            ),
        }

        info!("Waiting for HTTP server to fully shut down...");
        match self.server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        info!("Closing job store...");
        self.engine.store().close().await;
        info!("Job store closed");

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
