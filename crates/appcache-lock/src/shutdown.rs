//! Shutdown state machine.
//!
//! `Running -> ShuttingDown -> Stopped`. The first interrupt or terminate
//! signal moves a run to `ShuttingDown`: no new lock operations are started
//! and every live child is asked to terminate. The supervisor moves the run to
//! `Stopped` once all workers have returned.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestration::OrchestratorState;

/// Phase of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    ShuttingDown,
    Stopped,
}

/// Cloneable handle to a run's shutdown state machine.
///
/// Holds only a reference to the orchestrator's state; there is no global
/// registry of processes.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    phase: Arc<watch::Sender<ShutdownPhase>>,
    state: Arc<OrchestratorState>,
}

impl ShutdownHandle {
    pub fn new(state: Arc<OrchestratorState>) -> Self {
        let (tx, _rx) = watch::channel(ShutdownPhase::Running);
        Self {
            phase: Arc::new(tx),
            state,
        }
    }

    /// Begin shutdown. Returns `false` if shutdown had already begun.
    pub async fn trigger(&self) -> bool {
        let transitioned = self.phase.send_if_modified(|phase| {
            if *phase == ShutdownPhase::Running {
                *phase = ShutdownPhase::ShuttingDown;
                true
            } else {
                false
            }
        });
        if transitioned {
            let live = self.state.request_shutdown().await;
            info!(live, "Shutting down, terminating in-flight lock operations");
        }
        transitioned
    }

    /// Mark the run as fully stopped.
    pub fn mark_stopped(&self) {
        self.phase.send_replace(ShutdownPhase::Stopped);
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Whether shutdown has begun (`ShuttingDown` or `Stopped` after a trigger).
    pub fn is_triggered(&self) -> bool {
        self.state.is_shutting_down()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Token cancelled when shutdown is triggered, for blocking work to poll.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.shutdown_token()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn cancelled(&self) {
        let token = self.state.shutdown_token();
        token.cancelled().await;
    }

    /// Drive `fut` until it completes or shutdown is triggered, whichever
    /// comes first. `None` means shutdown won and `fut` was dropped.
    pub async fn until_triggered<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "SIGINT")
    }
}

/// Trigger `handle` on the first interrupt or terminate signal.
pub fn spawn_signal_listener(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal, "Received shutdown signal");
                handle.trigger().await;
            }
            Err(e) => warn!(error = %e, "Failed to install signal handler"),
        }
    })
}
