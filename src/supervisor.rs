// src/supervisor.rs

//! Runs the reconcile loop until it fails or the process is asked to stop.

use std::future::Future;

use anyhow::anyhow;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::errors::{DockshipError, Result};
use crate::exec::CommandRunner;
use crate::reconcile::{LoopSummary, ReconcileLoop, ShutdownHandle};

/// Resolves on SIGINT (Ctrl-C) or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Spawn `reconcile` and block until it exits or a shutdown signal arrives.
pub async fn supervise<R>(reconcile: ReconcileLoop<R>, handle: ShutdownHandle) -> Result<LoopSummary>
where
    R: CommandRunner + 'static,
{
    supervise_until(reconcile, handle, shutdown_signal()).await
}

/// Like [`supervise`], with the shutdown trigger supplied by the caller.
///
/// Only loop-level failures come back as `Err`; a single failed cycle is
/// already handled inside the loop.
pub async fn supervise_until<R, S>(
    reconcile: ReconcileLoop<R>,
    handle: ShutdownHandle,
    signal: S,
) -> Result<LoopSummary>
where
    R: CommandRunner + 'static,
    S: Future<Output = ()>,
{
    let mut task = tokio::spawn(reconcile.run());

    tokio::select! {
        joined = &mut task => {
            let result = flatten(joined);
            if let Err(e) = &result {
                error!(error = %e, "reconciliation loop exited");
            }
            return result;
        }
        _ = signal => {
            info!("shutting down; waiting for the current cycle to finish");
        }
    }

    handle.stop();
    flatten(task.await)
}

fn flatten(joined: std::result::Result<Result<LoopSummary>, JoinError>) -> Result<LoopSummary> {
    joined.map_err(|e| DockshipError::Other(anyhow!("reconciliation task failed: {e}")))?
}
