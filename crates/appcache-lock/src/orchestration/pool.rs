//! Semaphore-based worker pool for lock operation concurrency control.
//!
//! The [`WorkerPool`] limits the number of concurrent lock operations. A
//! worker holds a [`PoolPermit`] for the whole lifetime of its child process;
//! waiting for a permit is abandoned as soon as shutdown begins.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default maximum number of concurrent lock operations.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// A permit granting the right to run one lock operation.
///
/// When dropped, the permit is automatically returned to the pool.
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

/// Semaphore-based concurrency pool for lock operations.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    /// Create a new pool with the given concurrency limit.
    pub fn new(max_workers: usize) -> Self {
        let limit = if max_workers == 0 {
            DEFAULT_MAX_WORKERS
        } else {
            max_workers
        };

        debug!(max_workers = limit, "WorkerPool created");

        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            max_workers: limit,
        }
    }

    /// Acquire a permit, waiting until one becomes available.
    ///
    /// Fails immediately once `shutdown` is cancelled, even if a permit is free.
    pub async fn acquire(&self, shutdown: &CancellationToken) -> Result<PoolPermit, PoolError> {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => Err(PoolError::ShuttingDown),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                let permit = permit.map_err(|_| PoolError::Closed)?;
                Ok(PoolPermit { _permit: permit })
            }
        }
    }

    /// Maximum concurrency limit.
    pub const fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of available permits (slots) remaining.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

/// Errors from the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Shutdown began before a worker slot was granted.
    #[error("shutdown in progress")]
    ShuttingDown,

    /// The semaphore was closed.
    #[error("worker pool has been closed")]
    Closed,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pool_default_concurrency() {
        let pool = WorkerPool::default();
        assert_eq!(pool.max_workers(), DEFAULT_MAX_WORKERS);
        assert_eq!(pool.available_permits(), DEFAULT_MAX_WORKERS);
    }

    #[test]
    fn pool_zero_uses_default() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.max_workers(), DEFAULT_MAX_WORKERS);
    }

    #[tokio::test]
    async fn permit_returned_on_drop() {
        let pool = WorkerPool::new(1);
        let token = CancellationToken::new();

        {
            let _permit = pool.acquire(&token).await.unwrap();
            assert_eq!(pool.available_permits(), 0);
        }
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn acquire_waits_for_permit() {
        let pool = Arc::new(WorkerPool::new(1));
        let token = CancellationToken::new();

        let permit = pool.acquire(&token).await.unwrap();

        let pool_clone = Arc::clone(&pool);
        let token_clone = token.clone();
        let handle = tokio::spawn(async move {
            pool_clone.acquire(&token_clone).await.map(|_| ())
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(permit);

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("acquire should complete after permit released")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn waiting_acquire_aborts_on_shutdown() {
        let pool = Arc::new(WorkerPool::new(1));
        let token = CancellationToken::new();
        let _held = pool.acquire(&token).await.unwrap();

        let pool_clone = Arc::clone(&pool);
        let token_clone = token.clone();
        let handle = tokio::spawn(async move { pool_clone.acquire(&token_clone).await.map(|_| ()) });

        token.cancel();
        let result = tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(PoolError::ShuttingDown)));
    }

    #[tokio::test]
    async fn acquire_after_shutdown_fails_even_with_free_slots() {
        let pool = WorkerPool::new(2);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(pool.acquire(&token).await, Err(PoolError::ShuttingDown)));
        assert_eq!(pool.available_permits(), 2);
    }
}
