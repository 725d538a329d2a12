//! Human-readable run reporting through `tracing`.
//!
//! The core types carry data only; everything printed for an operator is
//! produced here.

use tracing::{debug, info, warn};

use appcache_core::format::{format_signed_size, format_size};
use appcache_core::memory::MemoryInfo;
use appcache_core::{Decision, SelectionResult};

use crate::supervisor::{RunReport, RunStatus};

const RULE_WIDTH: usize = 60;
const TABLE_WIDTH: usize = 80;

/// One audit-table row: priority, source, size, status, directory.
pub fn decision_row(decision: &Decision) -> String {
    let status = if decision.accepted { "SELECTED" } else { "SKIPPED" };
    format!(
        "{:<8} {:<8} {:<12} {:<10} {}",
        decision.priority,
        decision.source,
        format_size(decision.size_bytes),
        status,
        decision.path.display()
    )
}

/// Log the admission audit table and selection totals.
pub fn log_selection(selection: &SelectionResult) {
    info!(
        "Selecting directories within memory limit: {}",
        format_size(selection.budget_bytes)
    );
    info!("DIRECTORY ANALYSIS:");
    info!("{}", "-".repeat(TABLE_WIDTH));
    info!(
        "{:<8} {:<8} {:<12} {:<10} {}",
        "Priority", "Source", "Size", "Status", "Directory"
    );
    info!("{}", "-".repeat(TABLE_WIDTH));
    for decision in &selection.decisions {
        info!("{}", decision_row(decision));
    }
    info!("{}", "-".repeat(TABLE_WIDTH));
    info!(
        "Selected: {} directories, Total size: {}",
        selection.selected.len(),
        format_size(selection.total_selected_bytes)
    );
}

/// Log memory usage before and after locking.
pub fn log_memory_statistics(
    before: &MemoryInfo,
    after: &MemoryInfo,
    limit_percent: f64,
    budget_bytes: u64,
    cached_bytes: u64,
) {
    let rule = "=".repeat(RULE_WIDTH);
    info!("{rule}");
    info!("MEMORY STATISTICS");
    info!("{rule}");
    info!("Total System RAM:     {}", format_size(before.total));
    info!(
        "Memory Limit ({limit_percent}%):   {}",
        format_size(budget_bytes)
    );
    info!("BEFORE CACHING:");
    info!(
        "  Used Memory:        {} ({:.1}%)",
        format_size(before.used),
        before.percent
    );
    info!("  Available Memory:   {}", format_size(before.available));
    info!("CACHING OPERATION:");
    info!("  Data Cached:        {}", format_size(cached_bytes));
    info!("AFTER CACHING:");
    info!(
        "  Used Memory:        {} ({:.1}%)",
        format_size(after.used),
        after.percent
    );
    info!("  Available Memory:   {}", format_size(after.available));
    info!(
        "  Memory Increase:    {}",
        format_signed_size(i128::from(after.used) - i128::from(before.used))
    );
    info!("{rule}");
}

/// Log the completion line and every failed path. The full report is
/// attached as JSON at debug level.
pub fn log_run_summary(report: &RunReport) {
    match serde_json::to_string(report) {
        Ok(json) => debug!(report = %json, "Run report"),
        Err(e) => warn!(error = %e, "Failed to serialize run report"),
    }
    for outcome in report.failed_outcomes() {
        warn!(
            path = %outcome.path.display(),
            reason = %outcome.failure,
            exit_code = outcome.exit_code,
            detail = outcome.detail.as_deref().unwrap_or(""),
            "Directory not locked"
        );
    }
    match report.status {
        RunStatus::Aborted => warn!(
            locked = report.success_count,
            attempted = report.attempted_count,
            "Aborted: {}/{} directories locked before shutdown",
            report.success_count,
            report.attempted_count
        ),
        RunStatus::NothingSelected => warn!("No directories selected within memory limit"),
        RunStatus::DependencyMissing => warn!("Lock tool unavailable, nothing was locked"),
        RunStatus::Succeeded | RunStatus::PartialFailure => info!(
            status = %report.status,
            "Completed: {}/{} directories locked successfully",
            report.success_count,
            report.attempted_count
        ),
    }
}

/// Log the `verify-sizes` memory analysis.
pub fn log_verify_summary(memory: &MemoryInfo, selection: &SelectionResult, found: usize) {
    let rule = "=".repeat(RULE_WIDTH);
    let selected = selection.selected.len();
    let skipped = found.saturating_sub(selected);

    info!("MEMORY ANALYSIS SUMMARY:");
    info!("{rule}");
    info!("Total System RAM:     {}", format_size(memory.total));
    info!(
        "Currently Used:       {} ({:.1}%)",
        format_size(memory.used),
        memory.percent
    );
    info!("Available for Cache:  {}", format_size(selection.budget_bytes));
    info!(
        "Will be Cached:       {}",
        format_size(selection.total_selected_bytes)
    );
    info!(
        "Remaining Limit:      {}",
        format_size(selection.remaining_bytes())
    );
    info!("Directories Found:    {found}");
    info!("Directories Selected: {selected}");
    info!("Directories Skipped:  {skipped}");
    info!("{rule}");

    if skipped > 0 {
        warn!("{skipped} directories will be skipped due to memory limits");
    }
}
