//! External command helpers (`systemctl`).

use std::process::{Command, Output};

use anyhow::{Context, Result, bail};

fn exec(description: &str, program: &str, args: &[&str]) -> Result<Output> {
    let cmd_line = format!("{program} {}", args.join(" "));
    tracing::info!("{description}");
    tracing::debug!("exec: {cmd_line}");
    Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute: {cmd_line}"))
}

/// Run a command that must succeed.
pub fn run_cmd(description: &str, program: &str, args: &[&str]) -> Result<()> {
    let output = exec(description, program, args)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("{program} failed: {}", stderr.trim());
        bail!("{description} failed ({}): {}", output.status, stderr.trim());
    }
    Ok(())
}

/// Run a command that may legitimately fail, e.g. stopping a unit that is
/// not running. Returns whether it succeeded.
pub fn run_cmd_lenient(description: &str, program: &str, args: &[&str]) -> bool {
    match exec(description, program, args) {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            tracing::debug!(
                "ignored {program} failure ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::debug!("ignored: {e:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_cmd_reports_failure() {
        assert!(run_cmd("running true", "true", &[]).is_ok());
        assert!(run_cmd("running false", "false", &[]).is_err());
    }

    #[test]
    fn lenient_command_never_errors() {
        assert!(run_cmd_lenient("running true", "true", &[]));
        assert!(!run_cmd_lenient("running false", "false", &[]));
        assert!(!run_cmd_lenient("missing", "/nonexistent/program", &[]));
    }
}
