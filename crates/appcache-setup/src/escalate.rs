//! Root privilege handling for the installer.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use nix::unistd::geteuid;

/// Environment variables forwarded through `sudo`.
const PRESERVED_ENV: &str = "RUST_LOG";

pub fn is_root() -> bool {
    geteuid().is_root()
}

/// Arguments for `sudo` that re-run `exe` with `args`.
pub fn sudo_args(exe: &Path, args: &[OsString]) -> Vec<OsString> {
    let mut sudo = vec![
        OsString::from(format!("--preserve-env={PRESERVED_ENV}")),
        OsString::from("--"),
        exe.as_os_str().to_owned(),
    ];
    sudo.extend(args.iter().cloned());
    sudo
}

/// Return if already root. Otherwise ask to re-run through `sudo` and exit
/// with its status; refuse outright in non-interactive mode.
pub fn escalate_if_needed(action: &str, non_interactive: bool) -> Result<()> {
    if is_root() {
        return Ok(());
    }

    if non_interactive {
        bail!("{action} requires root privileges; re-run with sudo");
    }

    let confirmed = Confirm::new()
        .with_prompt(format!("{action} requires root privileges. Re-run with sudo?"))
        .default(true)
        .interact()?;
    if !confirmed {
        bail!("root privileges declined");
    }

    let exe = std::env::current_exe().context("cannot determine current executable")?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let sudo = sudo_args(&exe, &args);
    tracing::info!("re-executing with sudo");
    tracing::debug!("exec: sudo {sudo:?}");

    let status = Command::new("sudo")
        .args(&sudo)
        .status()
        .context("failed to run sudo")?;
    std::process::exit(status.code().unwrap_or(1));
}
