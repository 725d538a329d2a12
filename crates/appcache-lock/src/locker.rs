//! Lock tool abstraction.
//!
//! The orchestrator only depends on a [`LockCommand`]: something that can
//! build a process which locks one directory and reports success through its
//! exit status.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use appcache_core::Settings;
use appcache_core::discovery::locate_executable;

/// Builds the external process that locks a directory into memory.
pub trait LockCommand: Send + Sync {
    /// Program whose presence is checked once before any directory is attempted.
    fn program(&self) -> &Path;

    /// Build the command that locks `dir`.
    fn command(&self, dir: &Path) -> Command;

    /// Whether the lock tool can be found and executed.
    fn is_available(&self) -> bool {
        locate_executable(self.program(), std::env::var_os("PATH").as_deref()).is_some()
    }
}

/// `vmtouch`-based lock tool, optionally elevated through `sudo -n`.
#[derive(Debug, Clone)]
pub struct VmtouchLocker {
    bin: PathBuf,
    args: Vec<String>,
    elevate: bool,
}

impl VmtouchLocker {
    pub fn new(bin: PathBuf, args: Vec<String>, elevate: bool) -> Self {
        Self { bin, args, elevate }
    }

    /// Build from settings. Elevation is only used when not already root.
    pub fn from_settings(settings: &Settings) -> Self {
        let elevate = settings.use_sudo && !nix::unistd::geteuid().is_root();
        Self::new(settings.locker_bin.clone(), settings.locker_args.clone(), elevate)
    }

    pub const fn elevates(&self) -> bool {
        self.elevate
    }
}

impl LockCommand for VmtouchLocker {
    fn program(&self) -> &Path {
        &self.bin
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = if self.elevate {
            // -n: fail instead of prompting for a password.
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(&self.bin);
            cmd
        } else {
            Command::new(&self.bin)
        };
        cmd.args(&self.args).arg(dir);
        cmd
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn argv(cmd: &Command) -> Vec<String> {
        let std_cmd = cmd.as_std();
        std::iter::once(std_cmd.get_program())
            .chain(std_cmd.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn builds_plain_command() {
        let locker = VmtouchLocker::new("vmtouch".into(), vec!["-dlw".into()], false);
        let cmd = locker.command(Path::new("/opt/app"));
        assert_eq!(argv(&cmd), vec!["vmtouch", "-dlw", "/opt/app"]);
    }

    #[test]
    fn builds_elevated_command() {
        let locker = VmtouchLocker::new("vmtouch".into(), vec!["-dlw".into()], true);
        let cmd = locker.command(Path::new("/opt/app"));
        assert_eq!(argv(&cmd), vec!["sudo", "-n", "vmtouch", "-dlw", "/opt/app"]);
        assert!(locker.elevates());
    }

    #[test]
    fn default_settings_wait_for_the_lock() {
        let locker = VmtouchLocker::from_settings(&Settings::default());
        let args = argv(&locker.command(Path::new("/opt/app")));
        assert!(args.ends_with(&["vmtouch".to_string(), "-dlw".into(), "/opt/app".into()]));
    }

    #[test]
    fn missing_program_is_unavailable() {
        let locker = VmtouchLocker::new(
            "/nonexistent/appcache-test/vmtouch".into(),
            Vec::new(),
            false,
        );
        assert!(!locker.is_available());
    }

    #[test]
    fn from_settings_uses_configured_binary() {
        let settings = Settings {
            use_sudo: false,
            ..Settings::default()
        };
        let locker = VmtouchLocker::from_settings(&settings);
        assert_eq!(locker.program(), Path::new("vmtouch"));
        assert!(!locker.elevates());
    }
}
