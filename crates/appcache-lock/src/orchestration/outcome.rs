//! Per-path lock outcomes.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Classification of a lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The directory was locked.
    None,
    /// The lock tool is not installed; nothing was attempted.
    DependencyMissing,
    /// The operation exceeded its timeout and was terminated.
    Timeout,
    /// The lock tool ran to completion and reported failure.
    NonZeroExit,
    /// Spawn, wait or communication failure, including termination by shutdown.
    ProcessError,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DependencyMissing => "dependency_missing",
            Self::Timeout => "timeout",
            Self::NonZeroExit => "non_zero_exit",
            Self::ProcessError => "process_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Result of locking one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockOutcome {
    pub path: PathBuf,
    pub succeeded: bool,
    pub failure: FailureReason,
    /// Exit code of the lock tool, when it exited on its own.
    pub exit_code: Option<i32>,
    /// Human-readable failure detail (stderr tail, spawn error, ...).
    pub detail: Option<String>,
    pub elapsed: Duration,
}

impl LockOutcome {
    pub const fn success(path: PathBuf, elapsed: Duration) -> Self {
        Self {
            path,
            succeeded: true,
            failure: FailureReason::None,
            exit_code: Some(0),
            detail: None,
            elapsed,
        }
    }

    pub fn failed(
        path: PathBuf,
        failure: FailureReason,
        detail: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            path,
            succeeded: false,
            failure,
            exit_code: None,
            detail: Some(detail.into()),
            elapsed,
        }
    }

    #[must_use]
    pub const fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_has_no_failure() {
        let outcome = LockOutcome::success("/a".into(), Duration::ZERO);
        assert!(outcome.succeeded);
        assert_eq!(outcome.failure, FailureReason::None);
        assert!(outcome.detail.is_none());
    }

    #[test]
    fn failed_carries_reason_and_code() {
        let outcome = LockOutcome::failed(
            "/a".into(),
            FailureReason::NonZeroExit,
            "exit 1",
            Duration::ZERO,
        )
        .with_exit_code(Some(1));
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failure, FailureReason::NonZeroExit);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.failure.to_string(), "non_zero_exit");
    }
}
