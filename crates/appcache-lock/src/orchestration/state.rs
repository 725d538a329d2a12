//! Shared state of one orchestration run.
//!
//! [`OrchestratorState`] is owned by a single [`LockOrchestrator`] and shared
//! by reference with its worker tasks and the shutdown handler. Both the
//! live-process registry and the locked-path set sit behind one mutex.
//!
//! [`LockOrchestrator`]: super::LockOrchestrator

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A child lock process that is currently running.
#[derive(Debug, Clone)]
pub struct LiveProcess {
    pub path: PathBuf,
    pub pid: Option<u32>,
    pub started_at: Instant,
    /// Terminate request for this child; a child of the run's shutdown token.
    cancel: CancellationToken,
}

impl LiveProcess {
    pub fn running_for(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct Inner {
    live: HashMap<PathBuf, LiveProcess>,
    locked: Vec<PathBuf>,
    peak_live: usize,
}

/// Live child processes and confirmed locks for one run.
#[derive(Debug, Default)]
pub struct OrchestratorState {
    inner: Mutex<Inner>,
    shutdown: CancellationToken,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned child. Returns the token the worker must
    /// watch for terminate requests.
    pub async fn register(&self, path: &Path, pid: Option<u32>) -> CancellationToken {
        let cancel = self.shutdown.child_token();
        let mut inner = self.inner.lock().await;
        inner.live.insert(
            path.to_path_buf(),
            LiveProcess {
                path: path.to_path_buf(),
                pid,
                started_at: Instant::now(),
                cancel: cancel.clone(),
            },
        );
        inner.peak_live = inner.peak_live.max(inner.live.len());
        debug!(path = %path.display(), pid, live = inner.live.len(), "Registered lock process");
        drop(inner);
        cancel
    }

    /// Remove a child once it has exited or been terminated.
    pub async fn unregister(&self, path: &Path) -> Option<LiveProcess> {
        let removed = self.inner.lock().await.live.remove(path);
        if removed.is_some() {
            debug!(path = %path.display(), "Unregistered lock process");
        }
        removed
    }

    /// Record a confirmed lock. Recording the same path twice is a no-op.
    pub async fn mark_locked(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.locked.iter().any(|p| p == path) {
            return false;
        }
        inner.locked.push(path.to_path_buf());
        true
    }

    pub async fn live_count(&self) -> usize {
        self.inner.lock().await.live.len()
    }

    /// Highest number of simultaneously live children seen so far.
    pub async fn peak_live(&self) -> usize {
        self.inner.lock().await.peak_live
    }

    /// Paths confirmed locked, in completion order.
    pub async fn locked_paths(&self) -> Vec<PathBuf> {
        self.inner.lock().await.locked.clone()
    }

    /// Stop dispatching new work and send a terminate request to every live
    /// child. Returns the number of children that were live.
    pub async fn request_shutdown(&self) -> usize {
        self.shutdown.cancel();
        let inner = self.inner.lock().await;
        for process in inner.live.values() {
            info!(
                path = %process.path.display(),
                pid = process.pid,
                running_ms = u64::try_from(process.running_for().as_millis()).unwrap_or(u64::MAX),
                "Sending terminate request"
            );
            process.cancel.cancel();
        }
        inner.live.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_unregister() {
        let state = OrchestratorState::new();
        state.register(Path::new("/a"), Some(42)).await;
        assert_eq!(state.live_count().await, 1);

        let removed = state.unregister(Path::new("/a")).await.unwrap();
        assert_eq!(removed.pid, Some(42));
        assert_eq!(state.live_count().await, 0);
        assert!(state.unregister(Path::new("/a")).await.is_none());
    }

    #[tokio::test]
    async fn tracks_peak_live() {
        let state = OrchestratorState::new();
        state.register(Path::new("/a"), None).await;
        state.register(Path::new("/b"), None).await;
        state.unregister(Path::new("/a")).await;
        state.register(Path::new("/c"), None).await;
        assert_eq!(state.peak_live().await, 2);
    }

    #[tokio::test]
    async fn mark_locked_is_write_once() {
        let state = OrchestratorState::new();
        assert!(state.mark_locked(Path::new("/a")).await);
        assert!(!state.mark_locked(Path::new("/a")).await);
        assert!(state.mark_locked(Path::new("/b")).await);
        assert_eq!(
            state.locked_paths().await,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[tokio::test]
    async fn shutdown_cancels_every_live_token() {
        let state = OrchestratorState::new();
        let a = state.register(Path::new("/a"), Some(1)).await;
        let b = state.register(Path::new("/b"), Some(2)).await;
        assert!(!state.is_shutting_down());

        let live = state.request_shutdown().await;
        assert_eq!(live, 2);
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(state.is_shutting_down());
    }

    #[tokio::test]
    async fn registration_after_shutdown_is_already_cancelled() {
        let state = OrchestratorState::new();
        state.request_shutdown().await;
        let token = state.register(Path::new("/late"), None).await;
        assert!(token.is_cancelled());
    }
}
