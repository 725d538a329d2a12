//! Run supervision: catalog -> selection -> locking -> report.
//!
//! Selection always completes before any lock operation starts. Run-level
//! preconditions (empty catalog, empty selection, missing lock tool) are
//! reported through [`RunStatus`] before any concurrency begins.

use serde::Serialize;
use tracing::{debug, warn};

use appcache_core::{CandidateEntry, DirectoryCatalog, SelectionResult, select};

use crate::orchestration::{FailureReason, LockOrchestrator, LockOutcome, RunLimits};
use crate::report;
use crate::shutdown::ShutdownHandle;

/// Aggregate status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every selected directory was locked.
    Succeeded,
    /// At least one selected directory failed.
    PartialFailure,
    /// No candidates, or none fit the budget.
    NothingSelected,
    /// The lock tool is not available; nothing was attempted.
    DependencyMissing,
    /// Interrupted by a shutdown signal.
    Aborted,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::PartialFailure => "partial_failure",
            Self::NothingSelected => "nothing_selected",
            Self::DependencyMissing => "dependency_missing",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub selection: SelectionResult,
    /// One outcome per selected path, in completion order.
    pub outcomes: Vec<LockOutcome>,
    pub success_count: usize,
    pub attempted_count: usize,
    pub status: RunStatus,
}

impl RunReport {
    fn without_outcomes(selection: SelectionResult, status: RunStatus) -> Self {
        Self {
            selection,
            outcomes: Vec::new(),
            success_count: 0,
            attempted_count: 0,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &LockOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    /// Process exit code: 0 on success, 130 when aborted, 1 otherwise.
    pub const fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Succeeded => 0,
            RunStatus::Aborted => 130,
            RunStatus::PartialFailure | RunStatus::NothingSelected | RunStatus::DependencyMissing => {
                1
            }
        }
    }
}

/// Top-level coordinator for one run.
pub struct RunSupervisor {
    orchestrator: LockOrchestrator,
    shutdown: ShutdownHandle,
}

impl RunSupervisor {
    pub fn new(orchestrator: LockOrchestrator) -> Self {
        let shutdown = ShutdownHandle::new(std::sync::Arc::clone(orchestrator.state()));
        Self {
            orchestrator,
            shutdown,
        }
    }

    /// Handle for the signal listener.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub const fn orchestrator(&self) -> &LockOrchestrator {
        &self.orchestrator
    }

    /// Build the catalog, select within `budget_bytes`, and lock the selection.
    pub async fn execute(
        &self,
        candidates: Vec<CandidateEntry>,
        budget_bytes: u64,
        limits: RunLimits,
    ) -> RunReport {
        let catalog = DirectoryCatalog::from_entries(candidates);
        if catalog.is_empty() {
            warn!("No directories to consider");
            return self.finish(RunReport::without_outcomes(
                SelectionResult {
                    budget_bytes,
                    ..SelectionResult::default()
                },
                RunStatus::NothingSelected,
            ));
        }

        let selection = select(catalog.records(), budget_bytes);
        debug!(
            candidates = catalog.len(),
            selected = selection.selected.len(),
            skipped = selection.skipped_count(),
            "Selection complete"
        );
        report::log_selection(&selection);

        if self.shutdown.is_triggered() {
            return self.finish(RunReport::without_outcomes(selection, RunStatus::Aborted));
        }
        if selection.is_empty() {
            warn!("No directories fit the memory budget");
            return self.finish(RunReport::without_outcomes(
                selection,
                RunStatus::NothingSelected,
            ));
        }

        let outcomes = self.orchestrator.run(&selection.selected, limits).await;
        let success_count = outcomes.iter().filter(|o| o.succeeded).count();
        let attempted_count = outcomes.len();

        let status = if self.shutdown.is_triggered() {
            RunStatus::Aborted
        } else if outcomes
            .iter()
            .any(|o| o.failure == FailureReason::DependencyMissing)
        {
            RunStatus::DependencyMissing
        } else if attempted_count > 0 && success_count == attempted_count {
            RunStatus::Succeeded
        } else {
            RunStatus::PartialFailure
        };

        self.finish(RunReport {
            selection,
            outcomes,
            success_count,
            attempted_count,
            status,
        })
    }

    fn finish(&self, report: RunReport) -> RunReport {
        if report.status == RunStatus::Aborted {
            self.shutdown.mark_stopped();
            warn!(
                locked = report.success_count,
                attempted = report.attempted_count,
                "Run aborted by shutdown signal"
            );
        }
        report
    }
}
