//! Install and uninstall the boot-time preload service.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use appcache_core::Settings;
use appcache_core::config::{APP_COMMANDS_FILE, RESOURCE_DIRS_FILE, SETTINGS_FILE};

use crate::cmd::{run_cmd, run_cmd_lenient};
use crate::templates;

/// Installed binary location.
pub const BINARY_PATH: &str = "/usr/local/bin/appcache-lock";

/// Installed configuration directory.
pub const CONFIG_DIR: &str = "/etc/appcache-lock";

/// systemd unit file.
pub const UNIT_PATH: &str = "/etc/systemd/system/appcache-lock.service";

/// systemd unit name.
pub const UNIT_NAME: &str = "appcache-lock.service";

/// Arguments for the `install` subcommand.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Path to the appcache-lock binary to install (default: next to this program)
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// Directory holding app_commands, resource_dirs and settings.json
    #[arg(long, default_value = ".")]
    pub source_dir: PathBuf,

    /// Write the unit without enabling it
    #[arg(long)]
    pub no_enable: bool,
}

/// Where installed files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub binary: PathBuf,
    pub config_dir: PathBuf,
    pub unit: PathBuf,
}

impl Default for InstallPaths {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(BINARY_PATH),
            config_dir: PathBuf::from(CONFIG_DIR),
            unit: PathBuf::from(UNIT_PATH),
        }
    }
}

/// Install the binary, configuration and unit, then enable the unit.
///
/// Assumes we are running as root (enforced by escalate).
pub fn install(args: &InstallArgs, paths: &InstallPaths) -> Result<()> {
    tracing::info!("starting AppCache-Lock installation");

    let source_binary = match &args.binary {
        Some(path) => path.clone(),
        None => sibling_binary()?,
    };
    install_binary(&source_binary, &paths.binary)?;

    let copied = copy_config_files(&args.source_dir, &paths.config_dir)?;
    if copied.is_empty() {
        tracing::warn!(
            "no configuration files found in {}; add app_commands and resource_dirs to {}",
            args.source_dir.display(),
            paths.config_dir.display()
        );
    }

    write_unit(paths)?;
    run_cmd("reloading systemd daemon", "systemctl", &["daemon-reload"])?;

    if args.no_enable {
        tracing::info!("service not enabled; run `sudo systemctl enable {UNIT_NAME}` to enable it");
    } else {
        run_cmd(
            "enabling appcache-lock",
            "systemctl",
            &["enable", UNIT_NAME],
        )?;
    }

    tracing::info!("installation completed");
    tracing::info!("start now:    sudo systemctl start {UNIT_NAME}");
    tracing::info!("check status: sudo systemctl status {UNIT_NAME}");
    Ok(())
}

/// Stop and disable the unit, then remove everything `install` wrote.
pub fn uninstall(paths: &InstallPaths) -> Result<()> {
    run_cmd_lenient("stopping appcache-lock", "systemctl", &["stop", UNIT_NAME]);
    run_cmd_lenient("disabling appcache-lock", "systemctl", &["disable", UNIT_NAME]);

    remove_installed(paths)?;

    run_cmd("reloading systemd daemon", "systemctl", &["daemon-reload"])?;
    tracing::info!("AppCache-Lock uninstalled");
    Ok(())
}

/// Copy the lock binary and make it executable.
fn install_binary(src: &Path, dest: &Path) -> Result<()> {
    tracing::info!("installing binary: {} -> {}", src.display(), dest.display());
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dest)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dest.display()))?;
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755))
        .context("failed to set permissions on appcache-lock binary")?;
    Ok(())
}

/// The `appcache-lock` binary built alongside this program.
fn sibling_binary() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot determine current executable")?;
    let candidate = exe
        .parent()
        .map(|dir| dir.join("appcache-lock"))
        .filter(|p| p.is_file());
    candidate.ok_or_else(|| {
        anyhow::anyhow!(
            "appcache-lock binary not found next to {}; pass --binary",
            exe.display()
        )
    })
}

/// Copy the list files (or their `.example` variants) and `settings.json`
/// into `dest_dir`. Returns the files written.
///
/// `settings.json` is validated before it is copied.
pub fn copy_config_files(source_dir: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("failed to create {}", dest_dir.display()))?;

    let mut written = Vec::new();
    for name in [APP_COMMANDS_FILE, RESOURCE_DIRS_FILE] {
        let src = source_dir.join(name);
        let example = source_dir.join(format!("{name}.example"));
        let Some(from) = [src, example].into_iter().find(|p| p.is_file()) else {
            tracing::warn!("{name} not found in {}", source_dir.display());
            continue;
        };
        let dest = dest_dir.join(name);
        fs::copy(&from, &dest)
            .with_context(|| format!("failed to copy {} to {}", from.display(), dest.display()))?;
        tracing::info!("copied {} to {}", from.display(), dest.display());
        written.push(dest);
    }

    let settings = source_dir.join(SETTINGS_FILE);
    if settings.is_file() {
        Settings::load(source_dir)?
            .validate()
            .with_context(|| format!("invalid {}", settings.display()))?;
        let dest = dest_dir.join(SETTINGS_FILE);
        fs::copy(&settings, &dest)
            .with_context(|| format!("failed to copy {}", settings.display()))?;
        tracing::info!("copied {} to {}", settings.display(), dest.display());
        written.push(dest);
    }

    Ok(written)
}

fn write_unit(paths: &InstallPaths) -> Result<()> {
    tracing::info!("writing systemd unit: {}", paths.unit.display());
    let content = templates::systemd_unit(&paths.binary, &paths.config_dir);
    fs::write(&paths.unit, content).context("failed to write systemd unit")
}

/// Remove the unit file, config directory and binary, skipping missing ones.
fn remove_installed(paths: &InstallPaths) -> Result<()> {
    if paths.unit.exists() {
        fs::remove_file(&paths.unit)
            .with_context(|| format!("failed to remove {}", paths.unit.display()))?;
        tracing::info!("removed service file: {}", paths.unit.display());
    }
    if paths.config_dir.exists() {
        fs::remove_dir_all(&paths.config_dir)
            .with_context(|| format!("failed to remove {}", paths.config_dir.display()))?;
        tracing::info!("removed config directory: {}", paths.config_dir.display());
    }
    if paths.binary.exists() {
        fs::remove_file(&paths.binary)
            .with_context(|| format!("failed to remove {}", paths.binary.display()))?;
        tracing::info!("removed binary: {}", paths.binary.display());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_paths(root: &Path) -> InstallPaths {
        InstallPaths {
            binary: root.join("bin/appcache-lock"),
            config_dir: root.join("etc/appcache-lock"),
            unit: root.join("appcache-lock.service"),
        }
    }

    #[test]
    fn default_paths() {
        let paths = InstallPaths::default();
        assert_eq!(paths.binary, Path::new("/usr/local/bin/appcache-lock"));
        assert_eq!(paths.config_dir, Path::new("/etc/appcache-lock"));
        assert_eq!(
            paths.unit,
            Path::new("/etc/systemd/system/appcache-lock.service")
        );
    }

    #[test]
    fn copies_lists_preferring_real_files_over_examples() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("app_commands"), "firefox\n").unwrap();
        fs::write(src.path().join("app_commands.example"), "example\n").unwrap();
        fs::write(src.path().join("resource_dirs.example"), "/usr/share/fonts\n").unwrap();

        let written = copy_config_files(src.path(), dest.path()).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dest.path().join("app_commands")).unwrap(),
            "firefox\n"
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("resource_dirs")).unwrap(),
            "/usr/share/fonts\n"
        );
    }

    #[test]
    fn missing_lists_are_skipped() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let written = copy_config_files(src.path(), &dest.path().join("conf")).unwrap();
        assert!(written.is_empty());
        assert!(dest.path().join("conf").is_dir());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(
            src.path().join("settings.json"),
            r#"{"memory_limit_percent": 99}"#,
        )
        .unwrap();

        assert!(copy_config_files(src.path(), dest.path()).is_err());
        assert!(!dest.path().join("settings.json").exists());
    }

    #[test]
    fn install_binary_is_executable() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("build");
        fs::write(&src, "#!/bin/sh\n").unwrap();
        let paths = temp_paths(root.path());

        install_binary(&src, &paths.binary).unwrap();

        let mode = fs::metadata(&paths.binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn remove_installed_removes_written_files() {
        let root = tempfile::tempdir().unwrap();
        let paths = temp_paths(root.path());
        fs::create_dir_all(paths.binary.parent().unwrap()).unwrap();
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.binary, "bin").unwrap();
        fs::write(paths.config_dir.join("app_commands"), "x\n").unwrap();
        write_unit(&paths).unwrap();

        remove_installed(&paths).unwrap();

        assert!(!paths.binary.exists());
        assert!(!paths.config_dir.exists());
        assert!(!paths.unit.exists());
        // Nothing left to remove is not an error.
        remove_installed(&paths).unwrap();
    }
}
