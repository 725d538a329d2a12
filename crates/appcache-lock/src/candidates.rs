//! Candidate gathering: configured commands and resource directories become
//! sized [`CandidateEntry`] values for the catalog.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use tracing::{debug, info};

use appcache_core::CandidateEntry;
use appcache_core::config::ConfigLists;
use appcache_core::discovery::{
    dedup_directories, find_executable_directories, validate_directories,
};
use appcache_core::format::format_size;
use appcache_core::sizes::directory_size_until;

use crate::shutdown::ShutdownHandle;

/// Resolve, validate, deduplicate and measure every configured directory.
///
/// Directories holding a resolved application executable are classified as
/// app directories; everything else is a resource directory. Blocking.
pub fn discover_candidates(lists: &ConfigLists, path_var: Option<&OsStr>) -> Vec<CandidateEntry> {
    discover_candidates_until(lists, path_var, &|| false).unwrap_or_default()
}

/// [`discover_candidates`] that abandons measuring once `stop` returns `true`.
pub fn discover_candidates_until(
    lists: &ConfigLists,
    path_var: Option<&OsStr>,
    stop: &dyn Fn() -> bool,
) -> Option<Vec<CandidateEntry>> {
    let app_dirs = find_executable_directories(&lists.app_commands, path_var);
    let app_set: HashSet<PathBuf> = app_dirs
        .iter()
        .map(|dir| std::fs::canonicalize(dir).unwrap_or_else(|_| dir.clone()))
        .collect();

    let mut all = app_dirs;
    all.extend(lists.resource_dirs.iter().cloned());

    let valid = validate_directories(&all);
    let unique = dedup_directories(&valid);
    info!(
        configured = all.len(),
        valid = valid.len(),
        unique = unique.len(),
        "Analyzing directory sizes"
    );

    let mut candidates = Vec::with_capacity(unique.len());
    for path in unique {
        let Some(size) = directory_size_until(&path, stop) else {
            debug!(path = %path.display(), "Size measurement abandoned");
            return None;
        };
        let is_app = app_set.contains(&path);
        debug!(
            path = %path.display(),
            size = %format_size(size),
            app = is_app,
            "Measured directory"
        );
        candidates.push(CandidateEntry::new(path, size, is_app));
    }
    Some(candidates)
}

/// [`discover_candidates`] on the blocking pool, using the process `PATH`.
///
/// Returns `Ok(None)` as soon as `shutdown` is triggered; the walk on the
/// blocking pool notices the same trigger and stops at its next directory.
pub async fn gather_candidates(
    lists: ConfigLists,
    shutdown: &ShutdownHandle,
) -> Result<Option<Vec<CandidateEntry>>, tokio::task::JoinError> {
    let path_var: Option<OsString> = std::env::var_os("PATH");
    let token = shutdown.cancellation_token();
    let walk = tokio::task::spawn_blocking(move || {
        discover_candidates_until(&lists, path_var.as_deref(), &|| token.is_cancelled())
    });
    match shutdown.until_triggered(walk).await {
        Some(joined) => joined,
        None => Ok(None),
    }
}
