//! Lock orchestrator.
//!
//! [`LockOrchestrator`] runs one external lock operation per path:
//! - checks once that the lock tool is available (fails every path otherwise)
//! - bounds concurrency with a [`WorkerPool`]
//! - registers each child in [`OrchestratorState`] before waiting on it
//! - enforces a per-operation timeout (SIGTERM -> grace -> SIGKILL)
//! - terminates children cooperatively when shutdown begins
//!
//! Every submitted path yields exactly one [`LockOutcome`]; outcomes arrive
//! in completion order.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use appcache_core::Settings;

use super::outcome::{FailureReason, LockOutcome};
use super::pool::WorkerPool;
use super::process::terminate_process;
use super::state::OrchestratorState;
use crate::locker::LockCommand;

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Maximum stderr lines kept as failure detail.
const STDERR_TAIL_LINES: usize = 20;

/// Per-run execution limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Maximum concurrent lock operations (>= 1).
    pub max_workers: usize,
    /// Timeout for a single lock operation.
    pub per_op_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_workers: 4,
            per_op_timeout: Duration::from_secs(300),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Wait between terminate request and forced kill.
    pub terminate_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            terminate_grace: DEFAULT_TERMINATE_GRACE,
        }
    }
}

impl OrchestratorConfig {
    pub const fn from_settings(settings: &Settings) -> Self {
        Self {
            terminate_grace: Duration::from_secs(settings.terminate_grace_secs),
        }
    }
}

impl RunLimits {
    pub const fn from_settings(settings: &Settings) -> Self {
        Self {
            max_workers: settings.max_workers,
            per_op_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Everything a worker task needs, shared by reference.
struct WorkerContext {
    locker: Arc<dyn LockCommand>,
    state: Arc<OrchestratorState>,
    pool: WorkerPool,
    per_op_timeout: Duration,
    terminate_grace: Duration,
}

/// How a lock process finished.
enum Exit {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs lock operations for one run.
pub struct LockOrchestrator {
    locker: Arc<dyn LockCommand>,
    config: OrchestratorConfig,
    state: Arc<OrchestratorState>,
}

impl LockOrchestrator {
    pub fn new(locker: Arc<dyn LockCommand>, config: OrchestratorConfig) -> Self {
        Self {
            locker,
            config,
            state: Arc::new(OrchestratorState::new()),
        }
    }

    /// State shared with worker tasks and the shutdown handler.
    pub const fn state(&self) -> &Arc<OrchestratorState> {
        &self.state
    }

    /// Whether the lock tool can be run.
    pub fn dependency_available(&self) -> bool {
        self.locker.is_available()
    }

    /// Lock every path, returning one outcome per path in completion order.
    pub async fn run(&self, paths: &[PathBuf], limits: RunLimits) -> Vec<LockOutcome> {
        if paths.is_empty() {
            return Vec::new();
        }

        if !self.dependency_available() {
            let program = self.locker.program().display().to_string();
            error!(
                program = %program,
                "Lock tool is not installed or not in PATH (install it, e.g. `sudo apt install vmtouch`)"
            );
            return paths
                .iter()
                .map(|path| {
                    LockOutcome::failed(
                        path.clone(),
                        FailureReason::DependencyMissing,
                        format!("{program} not found"),
                        Duration::ZERO,
                    )
                })
                .collect();
        }

        let ctx = Arc::new(WorkerContext {
            locker: Arc::clone(&self.locker),
            state: Arc::clone(&self.state),
            pool: WorkerPool::new(limits.max_workers),
            per_op_timeout: limits.per_op_timeout,
            terminate_grace: self.config.terminate_grace,
        });

        info!(
            directories = paths.len(),
            max_workers = ctx.pool.max_workers(),
            timeout_secs = limits.per_op_timeout.as_secs(),
            "Locking directories into memory"
        );

        let mut tasks = JoinSet::new();
        for path in paths {
            tasks.spawn(lock_directory(Arc::clone(&ctx), path.clone()));
        }

        let mut pending: HashSet<&PathBuf> = paths.iter().collect();
        let mut outcomes = Vec::with_capacity(paths.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(&outcome.path);
                    outcomes.push(outcome);
                }
                Err(e) => error!(error = %e, "Lock task failed"),
            }
        }

        // A task that panicked still owes its path an outcome, and may have
        // left its child registered.
        for path in pending {
            if let Some(stale) = self.state.unregister(path).await {
                warn!(
                    path = %path.display(),
                    pid = ?stale.pid,
                    "Dropping registry entry of failed lock task"
                );
            }
            outcomes.push(LockOutcome::failed(
                path.clone(),
                FailureReason::ProcessError,
                "worker task failed",
                Duration::ZERO,
            ));
        }

        outcomes
    }
}

/// Lock a single directory. Never fails: every error becomes an outcome.
async fn lock_directory(ctx: Arc<WorkerContext>, path: PathBuf) -> LockOutcome {
    let started = Instant::now();
    let shutdown = ctx.state.shutdown_token();

    let _permit = match ctx.pool.acquire(&shutdown).await {
        Ok(permit) => permit,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Lock not started");
            return LockOutcome::failed(
                path,
                FailureReason::ProcessError,
                format!("not started: {e}"),
                started.elapsed(),
            );
        }
    };
    if shutdown.is_cancelled() {
        return LockOutcome::failed(
            path,
            FailureReason::ProcessError,
            "not started: shutdown in progress",
            started.elapsed(),
        );
    }

    let mut cmd = ctx.locker.command(&path);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        // Own group so termination reaches processes behind `sudo`.
        .process_group(0);

    info!(path = %path.display(), "Locking directory");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to spawn lock tool");
            return LockOutcome::failed(
                path,
                FailureReason::ProcessError,
                format!("spawn failed: {e}"),
                started.elapsed(),
            );
        }
    };

    // Registered before the first await on the child, so a shutdown request
    // always finds it.
    let pid = child.id();
    let cancel = ctx.state.register(&path, pid).await;

    if let Some(stdout) = child.stdout.take() {
        let p = path.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(path = %p.display(), "stdout: {}", line);
            }
        });
    }
    let stderr_tail = child
        .stderr
        .take()
        .map(|stderr| spawn_stderr_reader(stderr, path.clone()));

    let exit = tokio::select! {
        biased;
        () = cancel.cancelled() => Exit::Cancelled,
        status = child.wait() => Exit::Exited(status),
        () = tokio::time::sleep(ctx.per_op_timeout) => Exit::TimedOut,
    };

    let outcome = match exit {
        Exit::Exited(Ok(status)) if status.success() => {
            info!(path = %path.display(), pid, "Successfully locked");
            LockOutcome::success(path.clone(), started.elapsed())
        }
        Exit::Exited(Ok(status)) => {
            let stderr = collect_tail(stderr_tail, ctx.terminate_grace).await;
            error!(path = %path.display(), pid, ?status, stderr = %stderr, "Failed to lock");
            LockOutcome::failed(
                path.clone(),
                FailureReason::NonZeroExit,
                non_empty_or(stderr, || format!("lock tool exited with {status}")),
                started.elapsed(),
            )
            .with_exit_code(status.code())
        }
        Exit::Exited(Err(e)) => {
            error!(path = %path.display(), pid, error = %e, "Error waiting for lock tool");
            terminate_process(&mut child, ctx.terminate_grace).await;
            LockOutcome::failed(
                path.clone(),
                FailureReason::ProcessError,
                format!("wait failed: {e}"),
                started.elapsed(),
            )
        }
        Exit::TimedOut => {
            warn!(
                path = %path.display(),
                pid,
                timeout_secs = ctx.per_op_timeout.as_secs_f64(),
                "Lock timed out, terminating"
            );
            let how = terminate_process(&mut child, ctx.terminate_grace).await;
            LockOutcome::failed(
                path.clone(),
                FailureReason::Timeout,
                format!("timed out after {:?} ({how:?})", ctx.per_op_timeout),
                started.elapsed(),
            )
        }
        Exit::Cancelled => {
            info!(path = %path.display(), pid, "Terminating lock for shutdown");
            let how = terminate_process(&mut child, ctx.terminate_grace).await;
            LockOutcome::failed(
                path.clone(),
                FailureReason::ProcessError,
                format!("terminated by shutdown ({how:?})"),
                started.elapsed(),
            )
        }
    };

    ctx.state.unregister(&path).await;
    if outcome.succeeded {
        ctx.state.mark_locked(&path).await;
    }
    outcome
}

/// Log stderr lines as they arrive and keep the last few for the outcome.
fn spawn_stderr_reader<R>(stderr: R, path: PathBuf) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = Vec::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(path = %path.display(), "stderr: {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        }
        tail
    })
}

/// Join the stderr reader, giving up after `wait` (a daemonised grandchild
/// may keep the pipe open).
async fn collect_tail(reader: Option<JoinHandle<Vec<String>>>, wait: Duration) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    match tokio::time::timeout(wait, reader).await {
        Ok(Ok(lines)) => lines.join("\n"),
        _ => String::new(),
    }
}

fn non_empty_or(s: String, fallback: impl FnOnce() -> String) -> String {
    if s.trim().is_empty() { fallback() } else { s }
}
