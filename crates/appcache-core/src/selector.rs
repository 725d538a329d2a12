//! Budgeted admission of catalog directories.
//!
//! [`select`] orders candidates by `(priority ascending, size descending)` and
//! walks them once, admitting every directory that still fits the remaining
//! byte budget. This is a greedy policy, not a knapsack optimum: a skipped
//! directory is never revisited and directories are never split.

use std::cmp::Reverse;
use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::{DirectoryRecord, Source};

/// Verdict for one candidate, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub path: PathBuf,
    pub priority: u32,
    pub source: Source,
    pub size_bytes: u64,
    pub accepted: bool,
}

/// Outcome of budgeted admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionResult {
    /// Accepted paths in evaluation order.
    pub selected: Vec<PathBuf>,
    /// Sum of accepted sizes.
    pub total_selected_bytes: u64,
    /// Full audit trail: every candidate with its verdict, in evaluation order.
    pub decisions: Vec<Decision>,
    /// Budget the selection was made against.
    pub budget_bytes: u64,
}

impl SelectionResult {
    pub fn skipped_count(&self) -> usize {
        self.decisions.iter().filter(|d| !d.accepted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Budget left after admission.
    pub const fn remaining_bytes(&self) -> u64 {
        self.budget_bytes.saturating_sub(self.total_selected_bytes)
    }
}

/// Select the directories that fit `budget_bytes`.
///
/// Ties on `(priority, size)` keep input order, so identical inputs always
/// produce identical results.
pub fn select(records: &[DirectoryRecord], budget_bytes: u64) -> SelectionResult {
    let mut ordered: Vec<&DirectoryRecord> = records.iter().collect();
    // `sort_by_key` is stable.
    ordered.sort_by_key(|r| (r.priority, Reverse(r.size_bytes)));

    let mut running_total: u64 = 0;
    let mut selected = Vec::new();
    let mut decisions = Vec::with_capacity(ordered.len());

    for record in ordered {
        let accepted = match running_total.checked_add(record.size_bytes) {
            Some(next) if next <= budget_bytes => {
                running_total = next;
                selected.push(record.path.clone());
                true
            }
            _ => false,
        };

        decisions.push(Decision {
            path: record.path.clone(),
            priority: record.priority,
            source: record.source,
            size_bytes: record.size_bytes,
            accepted,
        });
    }

    SelectionResult {
        selected,
        total_selected_bytes: running_total,
        decisions,
        budget_bytes,
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{CandidateEntry, DirectoryCatalog};

    fn catalog(entries: &[(&str, u64, bool)]) -> DirectoryCatalog {
        DirectoryCatalog::from_entries(
            entries
                .iter()
                .map(|(p, size, app)| CandidateEntry::new(*p, *size, *app)),
        )
    }

    fn paths(list: &[PathBuf]) -> Vec<String> {
        list.iter().map(|p| p.display().to_string()).collect()
    }

    #[test]
    fn greedy_walk_skips_and_continues() {
        let c = catalog(&[("/p1", 100, true), ("/p2", 80, true), ("/p3", 50, false)]);
        let result = select(c.records(), 150);

        let order: Vec<_> = result.decisions.iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths(&order), vec!["/p1", "/p2", "/p3"]);
        assert_eq!(paths(&result.selected), vec!["/p1", "/p3"]);
        assert_eq!(result.total_selected_bytes, 150);
        assert!(!result.decisions[1].accepted);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.remaining_bytes(), 0);
    }

    #[test]
    fn large_budget_selects_everything() {
        let c = catalog(&[("/a", 10, false), ("/b", 30, true), ("/c", 20, false)]);
        let result = select(c.records(), c.total_bytes());
        assert_eq!(result.selected.len(), 3);
        assert!(result.decisions.iter().all(|d| d.accepted));
        assert_eq!(result.total_selected_bytes, 60);
    }

    #[test]
    fn budget_below_smallest_selects_nothing() {
        let c = catalog(&[("/a", 10, false), ("/b", 30, true)]);
        let result = select(c.records(), 9);
        assert!(result.is_empty());
        assert_eq!(result.decisions.len(), 2);
        assert_eq!(result.total_selected_bytes, 0);
    }

    #[test]
    fn zero_budget_skips_everything() {
        let c = catalog(&[("/a", 1, true)]);
        let result = select(c.records(), 0);
        assert!(result.is_empty());
        assert!(!result.decisions[0].accepted);
    }

    #[test]
    fn empty_records_give_empty_result() {
        let result = select(&[], 1024);
        assert!(result.selected.is_empty());
        assert!(result.decisions.is_empty());
        assert_eq!(result.budget_bytes, 1024);
    }

    #[test]
    fn priority_tier_evaluated_before_size() {
        // The big app directory does not fit, but is still evaluated (and
        // recorded) before the small resource directory that does.
        let c = catalog(&[("/res", 5, false), ("/app", 500, true)]);
        let result = select(c.records(), 100);

        assert_eq!(result.decisions[0].path, PathBuf::from("/app"));
        assert!(!result.decisions[0].accepted);
        assert_eq!(result.decisions[1].path, PathBuf::from("/res"));
        assert!(result.decisions[1].accepted);
        assert_eq!(paths(&result.selected), vec!["/res"]);
    }

    #[test]
    fn larger_first_within_tier() {
        let c = catalog(&[("/small", 10, false), ("/big", 90, false), ("/mid", 40, false)]);
        let result = select(c.records(), 100);
        let order: Vec<_> = result.decisions.iter().map(|d| d.path.clone()).collect();
        assert_eq!(paths(&order), vec!["/big", "/mid", "/small"]);
        assert_eq!(paths(&result.selected), vec!["/big", "/small"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let c = catalog(&[("/x", 10, false), ("/y", 10, false), ("/z", 10, false)]);
        let result = select(c.records(), 20);
        assert_eq!(paths(&result.selected), vec!["/x", "/y"]);
        assert!(!result.decisions[2].accepted);
    }

    #[test]
    fn selection_is_deterministic() {
        let c = catalog(&[
            ("/a", 7, true),
            ("/b", 7, false),
            ("/c", 3, true),
            ("/d", 11, false),
        ]);
        let first = select(c.records(), 15);
        let second = select(c.records(), 15);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn oversized_single_record_is_skipped_not_split() {
        let c = catalog(&[("/huge", u64::MAX, true), ("/tiny", 1, true)]);
        let result = select(c.records(), 10);
        assert_eq!(paths(&result.selected), vec!["/tiny"]);
        assert_eq!(result.total_selected_bytes, 1);
    }
}
