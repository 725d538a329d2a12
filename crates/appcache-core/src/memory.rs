//! System memory inspection via `/proc/meminfo`.
//!
//! The memory budget for a run is computed once from [`MemoryInfo::total`]
//! and is not refreshed while locking is in progress.

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

/// Default location of the kernel memory statistics.
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Snapshot of system memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
    /// Used memory as a percentage of total.
    pub percent: f64,
}

impl MemoryInfo {
    /// Read the current memory snapshot from `/proc/meminfo`.
    pub fn read() -> Result<Self> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Memory(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse `/proc/meminfo` content. Values are reported in kB.
    pub fn parse(content: &str) -> Result<Self> {
        let field = |name: &str| -> Option<u64> {
            content.lines().find_map(|line| {
                let rest = line.strip_prefix(name)?.strip_prefix(':')?;
                let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
                Some(kb.saturating_mul(1024))
            })
        };

        let total = field("MemTotal")
            .ok_or_else(|| Error::Memory("MemTotal missing from meminfo".to_string()))?;
        let free = field("MemFree").unwrap_or(0);
        // Kernels before 3.14 lack MemAvailable.
        let available = field("MemAvailable").unwrap_or(free);
        let used = total.saturating_sub(available);

        #[allow(clippy::cast_precision_loss)]
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };

        Ok(Self {
            total,
            available,
            used,
            free,
            percent,
        })
    }
}

/// Byte budget for `percent` of `total` memory, rounded down.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn budget_bytes(total: u64, percent: f64) -> u64 {
    if percent <= 0.0 {
        return 0;
    }
    let budget = (total as f64 * (percent / 100.0)).floor();
    if budget >= u64::MAX as f64 {
        u64::MAX
    } else {
        budget as u64
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = "MemTotal:       16000000 kB\n\
                          MemFree:         2000000 kB\n\
                          MemAvailable:    8000000 kB\n\
                          Buffers:          500000 kB\n";

    #[test]
    fn parses_meminfo() {
        let info = MemoryInfo::parse(SAMPLE).unwrap();
        assert_eq!(info.total, 16_000_000 * 1024);
        assert_eq!(info.free, 2_000_000 * 1024);
        assert_eq!(info.available, 8_000_000 * 1024);
        assert_eq!(info.used, 8_000_000 * 1024);
        assert!((info.percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_free_without_available() {
        let info = MemoryInfo::parse("MemTotal: 1000 kB\nMemFree: 250 kB\n").unwrap();
        assert_eq!(info.available, 250 * 1024);
        assert_eq!(info.used, 750 * 1024);
    }

    #[test]
    fn missing_total_is_error() {
        let err = MemoryInfo::parse("MemFree: 10 kB\n").unwrap_err();
        assert!(matches!(err, Error::Memory(_)));
    }

    #[test]
    fn budget_is_floor_of_fraction() {
        assert_eq!(budget_bytes(1000, 50.0), 500);
        assert_eq!(budget_bytes(999, 50.0), 499);
        assert_eq!(budget_bytes(1000, 0.0), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_live_meminfo() {
        let info = MemoryInfo::read().unwrap();
        assert!(info.total > 0);
    }
}
