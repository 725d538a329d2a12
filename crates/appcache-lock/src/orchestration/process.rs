//! Two-phase child process termination.

use std::time::Duration;

use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::{Pid, getpgid};
use tokio::process::Child;
use tracing::{debug, warn};

/// How a child was stopped by [`terminate_process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The child had already exited.
    AlreadyExited,
    /// The child exited within the grace period after SIGTERM.
    Graceful,
    /// The grace period expired and the child was killed.
    Killed,
}

/// Where termination signals are delivered.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The child leads its own process group; signal every member.
    Group(Pid),
    Process(Pid),
}

impl Target {
    fn of(raw: i32) -> Self {
        let pid = Pid::from_raw(raw);
        match getpgid(Some(pid)) {
            Ok(pgid) if pgid == pid => Self::Group(pid),
            _ => Self::Process(pid),
        }
    }

    fn signal(self, signal: Signal) -> nix::Result<()> {
        match self {
            Self::Group(pgid) => killpg(pgid, signal).or_else(|_| kill(pgid, signal)),
            Self::Process(pid) => kill(pid, signal),
        }
    }
}

/// Send SIGTERM, wait up to `grace` for the child to exit, then SIGKILL.
///
/// A child spawned as a process group leader is signalled as a group, so
/// wrappers such as `sudo` do not leave the real worker running.
pub async fn terminate_process(child: &mut Child, grace: Duration) -> Termination {
    // `id()` is `None` once the child has been reaped, so the pid cannot
    // have been recycled.
    let Some(pid) = child.id() else {
        return Termination::AlreadyExited;
    };

    let target = match i32::try_from(pid) {
        Ok(raw) => {
            let target = Target::of(raw);
            if let Err(e) = target.signal(Signal::SIGTERM) {
                warn!(pid, error = %e, "Failed to send SIGTERM");
            }
            Some(target)
        }
        Err(_) => {
            warn!(pid, "Pid out of range, skipping SIGTERM");
            None
        }
    };

    let termination = match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(pid, ?status, "Process exited after SIGTERM");
            Termination::Graceful
        }
        Ok(Err(e)) => {
            warn!(pid, error = %e, "Error waiting for process, killing");
            Termination::Killed
        }
        Err(_) => {
            warn!(pid, "Grace period expired, sending SIGKILL");
            Termination::Killed
        }
    };

    if termination == Termination::Killed {
        if let Some(Target::Group(pgid)) = target
            && let Err(e) = killpg(pgid, Signal::SIGKILL)
        {
            debug!(pid, error = %e, "Process group already gone");
        }
        let _ = child.kill().await;
    }
    termination
}
