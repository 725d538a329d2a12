//! Configuration loading for `AppCache-Lock`.
//!
//! A config directory holds:
//! 1. `app_commands` -- command names whose executable directories are cached
//! 2. `resource_dirs` -- additional directories to cache
//! 3. `settings.json` -- optional tunables
//!
//! Settings resolve as built-in defaults, then `settings.json`, then
//! `APPCACHE_*` environment variables. CLI flags are applied last by the
//! binaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// File listing application commands, one per line.
pub const APP_COMMANDS_FILE: &str = "app_commands";

/// File listing resource directories, one per line.
pub const RESOURCE_DIRS_FILE: &str = "resource_dirs";

/// Optional JSON settings file.
pub const SETTINGS_FILE: &str = "settings.json";

/// Accepted range for the memory limit, in percent of total RAM.
pub const MEMORY_LIMIT_RANGE: std::ops::RangeInclusive<f64> = 1.0..=90.0;

/// Tunables for a preload run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Share of total system memory that may be locked, in percent.
    pub memory_limit_percent: f64,
    /// Maximum concurrent lock operations.
    pub max_workers: usize,
    /// Per-directory lock timeout (seconds).
    pub timeout_secs: u64,
    /// Grace period between terminate and kill (seconds).
    pub terminate_grace_secs: u64,
    /// Lock tool binary.
    pub locker_bin: PathBuf,
    /// Arguments passed to the lock tool before the directory.
    pub locker_args: Vec<String>,
    /// Prefix the lock tool with `sudo -n` when not running as root.
    pub use_sudo: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory_limit_percent: 50.0,
            max_workers: 4,
            timeout_secs: 300,
            terminate_grace_secs: 5,
            locker_bin: PathBuf::from("vmtouch"),
            locker_args: vec!["-dlw".to_string()],
            use_sudo: true,
        }
    }
}

impl Settings {
    /// Load settings from `config_dir/settings.json` (if present) and the
    /// process environment.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(SETTINGS_FILE);
        let mut settings = if path.exists() {
            load_settings_file(&path)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Self::default()
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `APPCACHE_*` overrides from the given lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("APPCACHE_MEMORY_LIMIT").and_then(|v| v.parse().ok()) {
            self.memory_limit_percent = n;
        }
        if let Some(n) = lookup("APPCACHE_MAX_WORKERS").and_then(|v| v.parse().ok()) {
            self.max_workers = n;
        }
        if let Some(n) = lookup("APPCACHE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        if let Some(n) = lookup("APPCACHE_TERMINATE_GRACE").and_then(|v| v.parse().ok()) {
            self.terminate_grace_secs = n;
        }
        if let Some(bin) = lookup("APPCACHE_LOCKER_BIN") {
            self.locker_bin = PathBuf::from(bin);
        }
        if let Some(flag) = lookup("APPCACHE_USE_SUDO").and_then(|v| parse_bool(&v)) {
            self.use_sudo = flag;
        }
    }

    /// Validate the resolved settings.
    pub fn validate(&self) -> Result<()> {
        if !MEMORY_LIMIT_RANGE.contains(&self.memory_limit_percent) {
            return Err(Error::Config(format!(
                "Memory limit must be between 1 and 90 percent (got {})",
                self.memory_limit_percent
            )));
        }
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout must be at least 1 second".to_string()));
        }
        if self.locker_bin.as_os_str().is_empty() {
            return Err(Error::Config("locker_bin must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read settings file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse settings file {}: {}", path.display(), e))
    })
}

/// Parse list-file content: trimmed lines, skipping blanks and `#` comments.
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load a list file. A missing file is not an error: it is logged and yields
/// an empty list.
pub fn load_list_file(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        warn!(path = %path.display(), "Configuration file not found");
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let entries = parse_list(&content);
    debug!(path = %path.display(), count = entries.len(), "Loaded configuration entries");
    Ok(entries)
}

/// Command and directory lists read from a config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLists {
    pub app_commands: Vec<String>,
    pub resource_dirs: Vec<PathBuf>,
}

impl ConfigLists {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let app_commands = load_list_file(&config_dir.join(APP_COMMANDS_FILE))?;
        let resource_dirs = load_list_file(&config_dir.join(RESOURCE_DIRS_FILE))?
            .into_iter()
            .map(PathBuf::from)
            .collect();
        Ok(Self {
            app_commands,
            resource_dirs,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.app_commands.is_empty() && self.resource_dirs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_list_skips_comments_and_blanks() {
        let content = "# apps\nfirefox\n\n   code  \n#gimp\n";
        assert_eq!(parse_list(content), vec!["firefox", "code"]);
    }

    #[test]
    fn missing_list_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load_list_file(&dir.path().join("nope")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn config_lists_load_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(APP_COMMANDS_FILE), "bash\n").unwrap();
        std::fs::write(dir.path().join(RESOURCE_DIRS_FILE), "/usr/share/fonts\n# x\n").unwrap();

        let lists = ConfigLists::load(dir.path()).unwrap();
        assert_eq!(lists.app_commands, vec!["bash"]);
        assert_eq!(lists.resource_dirs, vec![PathBuf::from("/usr/share/fonts")]);
        assert!(!lists.is_empty());
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_workers, 4);
        assert_eq!(settings.timeout_secs, 300);
        assert_eq!(settings.terminate_grace_secs, 5);
        assert_eq!(settings.locker_args, vec!["-dlw"]);
    }

    #[test]
    fn settings_file_overrides_defaults_partially() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"max_workers": 8, "use_sudo": false}"#,
        )
        .unwrap();
        let settings = load_settings_file(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings.max_workers, 8);
        assert!(!settings.use_sudo);
        assert_eq!(settings.timeout_secs, 300);
    }

    #[test]
    fn malformed_settings_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        let err = load_settings_file(&dir.path().join(SETTINGS_FILE)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("APPCACHE_MEMORY_LIMIT", "40"),
            ("APPCACHE_MAX_WORKERS", "2"),
            ("APPCACHE_USE_SUDO", "no"),
            ("APPCACHE_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings.apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert!((settings.memory_limit_percent - 40.0).abs() < f64::EPSILON);
        assert_eq!(settings.max_workers, 2);
        assert!(!settings.use_sudo);
        assert_eq!(settings.timeout_secs, 300);
    }

    #[test]
    fn validate_rejects_out_of_range_limit() {
        let settings = Settings {
            memory_limit_percent: 95.0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            memory_limit_percent: 0.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let settings = Settings {
            max_workers: 0,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("max_workers"), "unexpected error: {err}");
    }
}
