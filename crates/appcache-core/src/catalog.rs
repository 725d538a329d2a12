//! Candidate directory catalog.
//!
//! A [`DirectoryCatalog`] is built fresh for every run from the directory list
//! and the measured sizes. Records are immutable once constructed.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Priority assigned to directories that back an application executable.
pub const APP_PRIORITY: u32 = 1;

/// Priority assigned to every other configured resource directory.
pub const RESOURCE_PRIORITY: u32 = 2;

/// Classification of a candidate directory, carried through for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Directory containing a configured application executable.
    App,
    /// Configured resource directory.
    Resource,
}

impl Source {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One caller-supplied candidate: an already canonical, deduplicated path
/// with its externally measured size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub is_app_directory: bool,
}

impl CandidateEntry {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, is_app_directory: bool) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            is_app_directory,
        }
    }
}

/// A candidate directory admitted into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    /// Canonical absolute path, unique across the catalog.
    pub path: PathBuf,
    /// Measured size of the directory subtree. Always non-zero in a catalog.
    pub size_bytes: u64,
    /// Lower value means higher priority.
    pub priority: u32,
    pub source: Source,
}

/// In-memory record of the candidate directories for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryCatalog {
    records: Vec<DirectoryRecord>,
}

impl DirectoryCatalog {
    /// Build the catalog, dropping zero-sized entries and assigning the
    /// two-tier priority. Input order is preserved.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CandidateEntry>,
    {
        let records = entries
            .into_iter()
            .filter(|entry| entry.size_bytes > 0)
            .map(|entry| {
                let (priority, source) = if entry.is_app_directory {
                    (APP_PRIORITY, Source::App)
                } else {
                    (RESOURCE_PRIORITY, Source::Resource)
                };
                DirectoryRecord {
                    path: entry.path,
                    size_bytes: entry.size_bytes,
                    priority,
                    source,
                }
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[DirectoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all candidate sizes.
    pub fn total_bytes(&self) -> u64 {
        self.records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.size_bytes))
    }
}
