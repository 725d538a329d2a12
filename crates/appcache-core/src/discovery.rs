//! Directory discovery: PATH lookup for application commands, validation and
//! deduplication of candidate directories.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Locate `program` the way a shell would.
///
/// A program containing a path separator is checked as-is; a bare name is
/// searched in `path_var` (a `PATH`-style list).
pub fn locate_executable(program: &Path, path_var: Option<&OsStr>) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return is_executable(program).then(|| program.to_path_buf());
    }
    let path_var = path_var?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Resolve each command on `path_var` and return the directory holding the
/// real (symlink-resolved) executable, in command order.
///
/// Commands that cannot be found are logged and skipped.
pub fn find_executable_directories(commands: &[String], path_var: Option<&OsStr>) -> Vec<PathBuf> {
    let mut directories = Vec::new();

    for cmd in commands {
        let Some(exe_path) = locate_executable(Path::new(cmd), path_var) else {
            warn!(command = %cmd, "Command not found in PATH");
            continue;
        };
        let real_path = match std::fs::canonicalize(&exe_path) {
            Ok(p) => p,
            Err(e) => {
                warn!(command = %cmd, path = %exe_path.display(), error = %e, "Failed to resolve executable");
                continue;
            }
        };
        let Some(exe_dir) = real_path.parent() else {
            continue;
        };
        info!(
            command = %cmd,
            executable = %real_path.display(),
            directory = %exe_dir.display(),
            "Found application executable"
        );
        directories.push(exe_dir.to_path_buf());
    }

    directories
}

/// Keep only directories that exist and can be listed.
pub fn validate_directories(directories: &[PathBuf]) -> Vec<PathBuf> {
    directories
        .iter()
        .filter(|dir| {
            if !dir.is_dir() {
                warn!(path = %dir.display(), "Directory does not exist");
                return false;
            }
            if let Err(e) = std::fs::read_dir(dir) {
                warn!(path = %dir.display(), error = %e, "Directory not readable");
                return false;
            }
            debug!(path = %dir.display(), "Validated directory");
            true
        })
        .cloned()
        .collect()
}

/// Canonicalise and deduplicate, keeping the first occurrence.
pub fn dedup_directories(directories: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(directories.len());

    for dir in directories {
        let normalized = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.clone());
        if seen.insert(normalized.clone()) {
            unique.push(normalized);
        }
    }

    let removed = directories.len() - unique.len();
    if removed > 0 {
        info!(removed, "Removed duplicate directories");
    }
    unique
}
