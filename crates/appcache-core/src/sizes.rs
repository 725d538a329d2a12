//! Directory size measurement.

use std::path::Path;

use tracing::debug;

/// Total size in bytes of the regular files below `dir`.
///
/// Symlinks are not followed and unreadable entries are skipped. A missing or
/// unreadable root measures as 0.
pub fn directory_size(dir: &Path) -> u64 {
    directory_size_until(dir, &|| false).unwrap_or(0)
}

/// [`directory_size`] that gives up once `stop` returns `true`.
///
/// `stop` is polled before every directory is read; `None` means the walk was
/// abandoned.
pub fn directory_size_until(dir: &Path, stop: &dyn Fn() -> bool) -> Option<u64> {
    let mut total = 0u64;
    walk(dir, &mut total, stop).then_some(total)
}

fn walk(dir: &Path, total: &mut u64, stop: &dyn Fn() -> bool) -> bool {
    if stop() {
        return false;
    }
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Skipping unreadable directory");
            return true;
        }
    };

    for entry in read_dir.flatten() {
        // DirEntry::metadata does not traverse symlinks.
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            if !walk(&entry.path(), total, stop) {
                return false;
            }
        } else if metadata.is_file() {
            *total = total.saturating_add(metadata.len());
        }
    }
    true
}
